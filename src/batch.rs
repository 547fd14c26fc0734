// libdivide.h - Optimized integer division
// https://libdivide.com
//
// Copyright (C) 2010 - 2021 ridiculous_fish, <libdivide@ridiculousfish.com>
// Copyright (C) 2016 - 2021 Kim Walisch, <kim.walisch@gmail.com>
//
// libdivide is dual-licensed under the Boost or zlib licenses.
// You may use libdivide under the terms of either of these.
// See LICENSE.txt for more details.

//! Dividing many numerators by the same divider.
//!
//! Every quotient depends only on its own numerator, so a slice can be split
//! into arbitrary partitions and divided concurrently.

use crate::BranchFreeDivider;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::thread;

/// Lazy quotients produced by [`BranchFreeDivider::divide_iter`].
#[derive(Clone, Debug)]
pub struct Quotients<I> {
    numers: I,
    denom: BranchFreeDivider,
}

impl<I: Iterator<Item = i64>> Iterator for Quotients<I> {
    type Item = i64;

    #[inline]
    fn next(&mut self) -> Option<i64> {
        self.numers.next().map(|n| self.denom.divide(n))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.numers.size_hint()
    }
}

impl<I: DoubleEndedIterator<Item = i64>> DoubleEndedIterator for Quotients<I> {
    #[inline]
    fn next_back(&mut self) -> Option<i64> {
        self.numers.next_back().map(|n| self.denom.divide(n))
    }
}

impl<I: ExactSizeIterator<Item = i64>> ExactSizeIterator for Quotients<I> {}

impl<I: FusedIterator<Item = i64>> FusedIterator for Quotients<I> {}

/// Number of partitions used when the caller has no better estimate: the
/// available hardware parallelism, or 1 if it cannot be queried.
pub fn default_partitions() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// How `par_divide_all` cuts its input: `chunk_len` numerators per
/// partition, `span` numerators per thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    chunk_len: usize,
    span: usize,
}

impl Layout {
    fn new(len: usize, partitions: NonZeroUsize, max_threads: NonZeroUsize) -> Layout {
        debug_assert!(len > 0);
        // never more partitions than numerators, never more threads than
        // partitions
        let partitions = partitions.get().min(len);
        let threads = max_threads.get().min(partitions);
        let chunk_len = len.div_ceil(partitions);
        let span = chunk_len.saturating_mul(partitions.div_ceil(threads)).min(len);
        Layout { chunk_len, span }
    }
}

impl BranchFreeDivider {
    /// Divides every numerator, returning the quotients in input order.
    pub fn divide_all(&self, numers: &[i64]) -> Vec<i64> {
        numers.iter().map(|&n| self.divide(n)).collect()
    }

    /// Lazy form of [`divide_all`](Self::divide_all).
    pub fn divide_iter<I>(&self, numers: I) -> Quotients<I::IntoIter>
    where
        I: IntoIterator<Item = i64>,
    {
        Quotients {
            numers: numers.into_iter(),
            denom: *self,
        }
    }

    /// Replaces each numerator with its quotient.
    pub fn divide_in_place(&self, numers: &mut [i64]) {
        for n in numers.iter_mut() {
            *n = self.divide(*n);
        }
    }

    /// Divides `numers` split into `partitions` contiguous chunks.
    ///
    /// At most [`default_partitions`] scoped threads are spawned; each takes a
    /// contiguous run of chunks. Every chunk is written to the matching chunk
    /// of the output, so the result is identical to
    /// [`divide_all`](Self::divide_all).
    pub fn par_divide_all(&self, numers: &[i64], partitions: NonZeroUsize) -> Vec<i64> {
        let mut quotients = vec![0i64; numers.len()];
        if numers.is_empty() {
            return quotients;
        }

        let layout = Layout::new(numers.len(), partitions, default_partitions());
        if layout.span == numers.len() {
            self.divide_chunks(numers, &mut quotients, layout.chunk_len);
            return quotients;
        }

        log::debug!(
            "dividing {} numerators in chunks of up to {} on {} threads",
            numers.len(),
            layout.chunk_len,
            numers.len().div_ceil(layout.span)
        );

        let denom = *self;
        thread::scope(|s| {
            for (src, dst) in numers
                .chunks(layout.span)
                .zip(quotients.chunks_mut(layout.span))
            {
                s.spawn(move || denom.divide_chunks(src, dst, layout.chunk_len));
            }
        });
        quotients
    }

    fn divide_chunks(&self, src: &[i64], dst: &mut [i64], chunk_len: usize) {
        for (src, dst) in src.chunks(chunk_len).zip(dst.chunks_mut(chunk_len)) {
            self.divide_chunk(src, dst);
        }
    }

    fn divide_chunk(&self, src: &[i64], dst: &mut [i64]) {
        debug_assert_eq!(src.len(), dst.len());
        for (q, &n) in dst.iter_mut().zip(src) {
            *q = self.divide(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitions(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn quotients_preserve_order_and_length() {
        let d = BranchFreeDivider::new(-3).unwrap();
        let q = d.divide_iter(vec![9, -9, 10, 0, 1]);
        assert_eq!(q.len(), 5);
        assert_eq!(q.collect::<Vec<_>>(), vec![-3, 3, -3, 0, 0]);
    }

    #[test]
    fn quotients_run_backwards() {
        let d = BranchFreeDivider::new(5).unwrap();
        let q: Vec<i64> = d.divide_iter(0..=20).rev().collect();
        assert_eq!(q.first(), Some(&4));
        assert_eq!(q.last(), Some(&0));
    }

    #[test]
    fn divides_in_place() {
        let d = BranchFreeDivider::new(100).unwrap();
        let mut buf = [1_000, -1_999, 99, i64::MIN];
        d.divide_in_place(&mut buf);
        assert_eq!(buf, [10, -19, 0, i64::MIN / 100]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let d = BranchFreeDivider::new(-12_345).unwrap();
        let numers: Vec<i64> = (-5_000..5_000).map(|i| i * 7_919_113).collect();
        let expected = d.divide_all(&numers);
        for k in [1, 2, 3, 7, 64, 10_000, 20_000] {
            assert_eq!(d.par_divide_all(&numers, partitions(k)), expected);
        }
    }

    #[test]
    fn parallel_handles_empty_and_tiny_inputs() {
        let d = BranchFreeDivider::new(2).unwrap();
        assert!(d.par_divide_all(&[], partitions(4)).is_empty());
        assert_eq!(d.par_divide_all(&[-5], partitions(4)), vec![-2]);
    }

    #[test]
    fn parallel_accepts_any_partition_count() {
        let d = BranchFreeDivider::new(3).unwrap();
        assert_eq!(
            d.par_divide_all(&[9, -9, 10], NonZeroUsize::MAX),
            vec![3, -3, 3]
        );
    }

    #[test]
    fn layout_caps_partitions_and_threads() {
        let layout = Layout::new(3, NonZeroUsize::MAX, partitions(8));
        assert_eq!(layout, Layout { chunk_len: 1, span: 1 });

        // 10_000 partitions on 4 threads: each thread runs 2_500 chunks
        let layout = Layout::new(10_000, partitions(20_000), partitions(4));
        assert_eq!(layout, Layout { chunk_len: 1, span: 2_500 });

        let layout = Layout::new(10, partitions(3), partitions(1));
        assert_eq!(layout, Layout { chunk_len: 4, span: 10 });

        let layout = Layout::new(usize::MAX, NonZeroUsize::MAX, NonZeroUsize::MAX);
        assert_eq!(layout, Layout { chunk_len: 1, span: 1 });
    }

    #[test]
    fn default_partitions_is_positive() {
        assert!(default_partitions().get() >= 1);
    }
}
