use std::ops::{Deref, DerefMut};

/// Raw pointer types a [`CBox`] can own.
pub(crate) trait RawPointer: Copy {
    fn null() -> Self;
    fn is_null(&self) -> bool;
}

impl<T> RawPointer for *const T {
    fn null() -> Self {
        std::ptr::null()
    }

    fn is_null(&self) -> bool {
        <*const T>::is_null(*self)
    }
}

impl<T> RawPointer for *mut T {
    fn null() -> Self {
        std::ptr::null_mut()
    }

    fn is_null(&self) -> bool {
        <*mut T>::is_null(*self)
    }
}

/// Owner of a SQLite object, released with `dealloc` unless null.
#[derive(Debug)]
pub(crate) struct CBox<T: RawPointer> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: RawPointer> CBox<T> {
    pub fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }

    /// Empty box, meant to be filled through an out pointer.
    pub fn null(dealloc: fn(T)) -> Self {
        Self::new(T::null(), dealloc)
    }

    /// Give up ownership, the caller is now responsible for the object.
    pub fn release(&mut self) -> T {
        std::mem::replace(&mut self.ptr, T::null())
    }
}

impl<T: RawPointer> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            (self.dealloc)(self.release());
        }
    }
}

impl<T: RawPointer> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: RawPointer> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

unsafe impl<T: RawPointer> Send for CBox<T> {}
