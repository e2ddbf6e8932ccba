// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Owning storage for self-referential binding blocks.
//!
//! The pipeline helpers keep their bound create info in a block whose raw pointers refer to
//! other fields of the same block. Moving a `Box<T>` retags it as a unique reference, after which
//! reads through those earlier pointers are undefined behavior. Holding the allocation as a
//! `NonNull<T>` keeps the pointers usable across moves of the helper.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

/// A heap allocation whose contents may hold raw pointers into itself.
///
/// Late-bound create-infos point at arrays and sub-structs stored next to them. A `Box` asserts
/// unique ownership every time it is moved, which would invalidate those pointers; this type
/// only ever hands out the raw allocation, so moving the owner leaves the pointers intact.
#[repr(transparent)]
pub(crate) struct AliasableBox<T> {
    ptr: NonNull<T>,
}

impl<T> AliasableBox<T> {
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        let ptr = Box::into_raw(Box::new(value));

        AliasableBox {
            // SAFETY: `Box::into_raw` never returns null.
            ptr: unsafe { NonNull::new_unchecked(ptr) },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AliasableBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Deref for AliasableBox<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: the allocation lives until `drop`.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for AliasableBox<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the allocation lives until `drop`, and `&mut self` excludes other borrows.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for AliasableBox<T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the pointer came from `Box::into_raw` and is dropped only once.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}
