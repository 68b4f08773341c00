//! Fixed-size memory blocks with length-checked serde support.
//!
//! Serde's derived impls stop at 32-element arrays, so the larger hardware
//! buffers (OAM, secondary OAM, line buffers) go through this wrapper, which
//! serializes as a sequence and rejects length mismatches on restore. A
//! rejected length surfaces as a decode error, which the save-state layer
//! maps to [`crate::Error::BadState`].

use core::ops::{Deref, DerefMut};

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemBlock<T, const N: usize>([T; N]);

/// Convenience alias for byte-sized blocks.
pub(crate) type ByteBlock<const N: usize> = MemBlock<u8, N>;

impl<T: Copy + Default, const N: usize> MemBlock<T, N> {
    pub(crate) fn new() -> Self {
        Self([T::default(); N])
    }
}

impl<T: Copy, const N: usize> MemBlock<T, N> {
    #[inline]
    pub(crate) fn filled(value: T) -> Self {
        Self([value; N])
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.0
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0
    }
}

impl<T: Copy + Default, const N: usize> Default for MemBlock<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> Deref for MemBlock<T, N> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Copy, const N: usize> DerefMut for MemBlock<T, N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T, const N: usize> serde::Serialize for MemBlock<T, N>
where
    T: Copy + serde::Serialize,
{
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(N))?;
        for item in &self.0 {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de, T, const N: usize> serde::Deserialize<'de> for MemBlock<T, N>
where
    T: Copy + Default + serde::Deserialize<'de>,
{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor<T, const N: usize>(core::marker::PhantomData<T>);

        impl<'de, T, const N: usize> serde::de::Visitor<'de> for Visitor<T, N>
        where
            T: Copy + Default + serde::Deserialize<'de>,
        {
            type Value = MemBlock<T, N>;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "a sequence of length {N}")
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut out = MemBlock::<T, N>::new();
                for idx in 0..N {
                    let Some(value) = seq.next_element::<T>()? else {
                        return Err(serde::de::Error::invalid_length(idx, &self));
                    };
                    out.0[idx] = value;
                }
                if seq.next_element::<T>()?.is_some() {
                    return Err(serde::de::Error::invalid_length(N + 1, &self));
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(Visitor::<T, N>(core::marker::PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_postcard() {
        let mut block = ByteBlock::<64>::new();
        block.as_mut_slice()[3] = 0xAB;
        let bytes = postcard::to_allocvec(&block).expect("serialize");
        let back: ByteBlock<64> = postcard::from_bytes(&bytes).expect("deserialize");
        assert_eq!(block, back);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let small = ByteBlock::<8>::filled(1);
        let bytes = postcard::to_allocvec(&small).expect("serialize");
        assert!(postcard::from_bytes::<ByteBlock<16>>(&bytes).is_err());
    }
}
