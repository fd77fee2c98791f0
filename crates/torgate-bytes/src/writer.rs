//! Internal: Declare the Writer type for torgate-bytes

use crate::Writeable;

/// A byte-oriented trait for writing to small arrays.
///
/// Unlike std::io::Write, this trait's methods are not allowed to
/// fail.  It's not for IO.
///
/// Most code will want to use the fact that Vec<u8> implements this trait.
/// To define a new implementation, just define the write_all method.
///
/// # Examples
///
/// You can use a Writer to add bytes explicitly:
/// ```
/// use torgate_bytes::Writer;
/// let mut w: Vec<u8> = Vec::new(); // Vec<u8> implements Writer.
/// w.write_u8(0x05);
/// w.write_u16(0x0050);
/// w.write_all(b"ok");
/// assert_eq!(w, &[0x05, 0x00, 0x50, 0x6f, 0x6b]);
/// ```
///
/// You can also use a Writer to encode things that implement the
/// Writeable trait:
///
/// ```
/// use torgate_bytes::{Writer,Writeable};
/// use std::net::Ipv4Addr;
/// let mut w: Vec<u8> = Vec::new();
/// let ip = Ipv4Addr::new(127, 0, 0, 1);
/// w.write(&ip);
/// assert_eq!(w, &[0x7f, 0x00, 0x00, 0x01]);
/// ```
pub trait Writer {
    /// Append a slice to the end of this writer.
    fn write_all(&mut self, b: &[u8]);

    /// Append a single u8 to this writer.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x])
    }
    /// Append a single u16 to this writer, encoded in big-endian order.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes())
    }
    /// Append a single u32 to this writer, encoded in big-endian order.
    fn write_u32(&mut self, x: u32) {
        self.write_all(&x.to_be_bytes())
    }
    /// Encode a Writeable object onto this writer, using its
    /// write_onto method.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) {
        e.write_onto(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_ints() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(1);
        v.write_u16(2);
        v.write_u32(3);

        assert_eq!(&v[..], &[1, 0, 2, 0, 0, 0, 3]);
    }

    #[test]
    fn write_slice() {
        let mut v = Vec::new();
        v.write_u16(0x534f);
        v.write(&b"CKS five"[..]);

        assert_eq!(&v[..], &b"SOCKS five"[..]);
    }

    #[test]
    fn writeable() {
        struct Countdown(u8);
        impl Writeable for Countdown {
            fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
                for i in (0..self.0).rev() {
                    b.write_u8(i);
                }
            }
        }

        let mut v = Vec::new();
        v.write(&Countdown(3));
        assert_eq!(&v[..], &[2, 1, 0]);

        v.write(&Countdown(0));
        assert_eq!(&v[..], &[2, 1, 0]);
    }
}
