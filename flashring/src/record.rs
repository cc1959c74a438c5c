//! Fixed-size record encoding.
//!
//! Every value stored in a queue slot implements [`Record`]: it has a
//! compile-time byte size and converts to and from exactly that many bytes.
//! Types that own heap memory or hold pointers have no meaningful fixed-size
//! byte image, so they simply cannot implement the trait and cannot be queued.
//!
//! Integers and floats are stored little-endian. Byte arrays are stored as-is.

/// A plain-old-data value that occupies exactly [`Record::SIZE`] bytes on disk.
///
/// # Examples
///
/// Implementing `Record` for a struct by laying its fields out in order:
///
/// ```rust
/// use flashring::Record;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct Reading {
///     sensor: u16,
///     millivolts: i32,
/// }
///
/// impl Record for Reading {
///     const SIZE: usize = 6;
///
///     fn encode(&self, buf: &mut [u8]) {
///         self.sensor.encode(&mut buf[..2]);
///         self.millivolts.encode(&mut buf[2..6]);
///     }
///
///     fn decode(buf: &[u8]) -> Self {
///         Self {
///             sensor: u16::decode(&buf[..2]),
///             millivolts: i32::decode(&buf[2..6]),
///         }
///     }
/// }
///
/// let mut buf = [0u8; Reading::SIZE];
/// let r = Reading { sensor: 3, millivolts: -1200 };
/// r.encode(&mut buf);
/// assert_eq!(Reading::decode(&buf), r);
/// ```
pub trait Record: Sized {
    /// Number of bytes this record occupies in a slot.
    const SIZE: usize;

    /// Writes the record into `buf`.
    ///
    /// `buf` is exactly [`Record::SIZE`] bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a record back from `buf`.
    ///
    /// `buf` is exactly [`Record::SIZE`] bytes long. Any byte pattern must
    /// decode to some value; an all-zero buffer is what a cleared slot holds.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_record_for_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_record_for_primitive!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl<const N: usize> Record for [u8; N] {
    const SIZE: usize = N;

    #[inline]
    fn encode(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(self);
    }

    #[inline]
    fn decode(buf: &[u8]) -> Self {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&buf[..N]);
        bytes
    }
}
