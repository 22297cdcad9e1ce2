//! Random-access input views read by reduction kernels.

/// Read-only, random-access sequence that every unit may read concurrently.
pub trait InputSequence: Sync {
    /// Element produced for an index.
    type Item;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Check if the sequence has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`. Callers keep `index < len()`.
    fn get(&self, index: usize) -> Self::Item;
}

impl<T: Clone + Sync> InputSequence for [T] {
    type Item = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> T {
        self[index].clone()
    }
}

/// Slice viewed through a per-element function.
pub struct Mapped<'a, T, M> {
    source: &'a [T],
    map: M,
}

impl<'a, T, M> Mapped<'a, T, M> {
    /// View `source` with `map` applied to each element on read.
    pub fn new(source: &'a [T], map: M) -> Self {
        Self { source, map }
    }
}

impl<T, M, U> InputSequence for Mapped<'_, T, M>
where
    T: Sync,
    M: Fn(&T) -> U + Sync,
{
    type Item = U;

    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, index: usize) -> U {
        (self.map)(&self.source[index])
    }
}

/// Sequence computed from its index.
pub struct Indexed<F> {
    len: usize,
    f: F,
}

impl<F> Indexed<F> {
    /// Sequence of `len` elements where element `i` is `f(i)`.
    pub fn new<U>(len: usize, f: F) -> Self
    where
        F: Fn(usize) -> U,
    {
        Self { len, f }
    }
}

impl<F, U> InputSequence for Indexed<F>
where
    F: Fn(usize) -> U + Sync,
{
    type Item = U;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> U {
        (self.f)(index)
    }
}
