use crate::types::CoreKind;

/// A core value lifted out of the arena for arithmetic.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Bool(b) => i64::from(b),
            Scalar::Int(v) => v,
            Scalar::UInt(v) => v as i64,
            Scalar::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Scalar::Bool(b) => u64::from(b),
            Scalar::Int(v) => v as u64,
            Scalar::UInt(v) => v,
            Scalar::Float(v) => v as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::UInt(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        }
    }

    /// Convert to the representation of `kind`, truncating and wrapping the
    /// way a store of that width would.
    #[must_use]
    pub fn cast(self, kind: CoreKind) -> Scalar {
        match kind {
            CoreKind::Bool => Scalar::Bool(self.as_bool()),
            CoreKind::Int8 => Scalar::Int(i64::from(self.as_i64() as i8)),
            CoreKind::Int16 => Scalar::Int(i64::from(self.as_i64() as i16)),
            CoreKind::Int32 => Scalar::Int(i64::from(self.as_i64() as i32)),
            CoreKind::Int64 => Scalar::Int(self.as_i64()),
            CoreKind::UInt8 => Scalar::UInt(u64::from(self.as_u64() as u8)),
            CoreKind::UInt16 => Scalar::UInt(u64::from(self.as_u64() as u16)),
            CoreKind::UInt32 => Scalar::UInt(u64::from(self.as_u64() as u32)),
            CoreKind::UInt64 | CoreKind::Str | CoreKind::Void => Scalar::UInt(self.as_u64()),
            CoreKind::Float32 => Scalar::Float(f64::from(self.as_f64() as f32)),
            CoreKind::Float64 => Scalar::Float(self.as_f64()),
        }
    }

    /// Little-endian bytes of this scalar stored as `kind`.
    pub(crate) fn encode(self, kind: CoreKind) -> ([u8; 8], usize) {
        let mut out = [0u8; 8];
        let size = kind.size();
        match self.cast(kind) {
            Scalar::Bool(b) => out[0] = u8::from(b),
            Scalar::Int(v) => out.copy_from_slice(&v.to_le_bytes()),
            Scalar::UInt(v) => out.copy_from_slice(&v.to_le_bytes()),
            Scalar::Float(v) if kind == CoreKind::Float32 => {
                out[..4].copy_from_slice(&(v as f32).to_le_bytes());
            }
            Scalar::Float(v) => out.copy_from_slice(&v.to_le_bytes()),
        }
        (out, size)
    }

    /// Read a scalar of `kind` from little-endian bytes (at least `kind.size()` long).
    pub(crate) fn decode(kind: CoreKind, bytes: &[u8]) -> Scalar {
        let mut buf = [0u8; 8];
        let size = kind.size().min(bytes.len());
        buf[..size].copy_from_slice(&bytes[..size]);
        match kind {
            CoreKind::Void => Scalar::UInt(0),
            CoreKind::Bool => Scalar::Bool(buf[0] != 0),
            CoreKind::Int8 => Scalar::Int(i64::from(buf[0] as i8)),
            CoreKind::Int16 => Scalar::Int(i64::from(i16::from_le_bytes([buf[0], buf[1]]))),
            CoreKind::Int32 => Scalar::Int(i64::from(i32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            CoreKind::Int64 => Scalar::Int(i64::from_le_bytes(buf)),
            CoreKind::UInt8 => Scalar::UInt(u64::from(buf[0])),
            CoreKind::UInt16 => Scalar::UInt(u64::from(u16::from_le_bytes([buf[0], buf[1]]))),
            CoreKind::UInt32 => Scalar::UInt(u64::from(u32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            CoreKind::UInt64 | CoreKind::Str => Scalar::UInt(u64::from_le_bytes(buf)),
            CoreKind::Float32 => Scalar::Float(f64::from(f32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            CoreKind::Float64 => Scalar::Float(f64::from_le_bytes(buf)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn narrowing_wraps() {
        assert_eq!(Scalar::Int(300).cast(CoreKind::Int8), Scalar::Int(44));
        assert_eq!(Scalar::Int(-1).cast(CoreKind::UInt8), Scalar::UInt(255));
        assert_eq!(Scalar::Float(3.9).cast(CoreKind::Int32), Scalar::Int(3));
        assert_eq!(Scalar::Int(0).cast(CoreKind::Bool), Scalar::Bool(false));
    }

    #[test]
    fn float32_loses_precision_on_cast() {
        let Scalar::Float(v) = Scalar::Float(0.1).cast(CoreKind::Float32) else {
            panic!("expected float");
        };
        assert!((v - 0.1).abs() < 1e-6);
        assert!(v != 0.1);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode_after_cast(v in any::<i64>(), k in 0usize..13) {
            let kind = CoreKind::ALL[k];
            prop_assume!(kind != CoreKind::Void);
            let (bytes, size) = Scalar::Int(v).encode(kind);
            let back = Scalar::decode(kind, &bytes[..size]);
            prop_assert_eq!(back, Scalar::Int(v).cast(kind));
        }
    }
}
