//! Общая для процессов область памяти

use std::io;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;

/// Анонимное отображение `MAP_SHARED` из `len` элементов типа `T`
///
/// Дочерние процессы, созданные через fork после создания области, видят
/// те же физические страницы: их записи видны родителю после waitpid.
/// Отображение снимается (munmap) в `Drop`.
pub struct SharedRegion<T> {
    ptr: *mut T,
    len: usize,
    bytes: usize,
    _marker: PhantomData<T>,
}

// Область владеет своей памятью, как Vec<T>
unsafe impl<T: Send> Send for SharedRegion<T> {}
unsafe impl<T: Sync> Sync for SharedRegion<T> {}

impl<T: Copy> SharedRegion<T> {
    /// Создает область и заполняет ее значением `init`
    pub fn new(len: usize, init: T) -> io::Result<Self> {
        SharedRegion::new_with(len, |_| init)
    }
}

impl<T> SharedRegion<T> {
    /// Создает область, элемент `i` получает значение `init(i)`
    pub fn new_with<F: FnMut(usize) -> T>(len: usize, mut init: F) -> io::Result<Self> {
        let bytes = len
            .checked_mul(mem::size_of::<T>())
            .filter(|&b| b > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty shared region"))?;

        let raw = sys_map!(libc::mmap(
            ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_ANONYMOUS,
            -1,
            0
        ))?;

        let ptr = raw as *mut T;
        for i in 0..len {
            // память свежая, старых значений нет
            unsafe { ptr::write(ptr.add(i), init(i)) };
        }

        Ok(Self {
            ptr,
            len,
            bytes,
            _marker: PhantomData,
        })
    }

    /// Размер отображения в байтах
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl<T> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr, self.len));
            libc::munmap(self.ptr as *mut libc::c_void, self.bytes);
        }
    }
}
