use serde_json::Value;

/// Fixed-layout field encoder feeding a BLAKE3 hasher.
///
/// Every field is written as a one-byte presence tag (`0` absent, `1`
/// present) followed, when present, by a little-endian `u32` length and the
/// field bytes. Integers are encoded little-endian. Because each field is
/// length-prefixed, no two distinct field sequences share an encoding.
pub struct CanonicalEncoder {
    hasher: blake3::Hasher,
}

impl CanonicalEncoder {
    pub fn new(hasher: blake3::Hasher) -> Self {
        Self { hasher }
    }

    pub fn bytes(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            None => {
                self.hasher.update(&[0]);
            }
            Some(bytes) => {
                self.hasher.update(&[1]);
                self.hasher.update(&(bytes.len() as u32).to_le_bytes());
                self.hasher.update(bytes);
            }
        }
        self
    }

    pub fn str(&mut self, value: Option<&str>) -> &mut Self {
        self.bytes(value.map(str::as_bytes))
    }

    pub fn u64(&mut self, value: Option<u64>) -> &mut Self {
        self.bytes(value.map(u64::to_le_bytes).as_ref().map(|b| b.as_slice()))
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.bytes(Some(value.to_le_bytes().as_slice()))
    }

    /// Encode JSON with object keys sorted, independent of map ordering.
    pub fn json(&mut self, value: Option<&Value>) -> &mut Self {
        let encoded = value.map(|v| {
            let mut out = Vec::new();
            write_sorted_json(v, &mut out);
            out
        });
        self.bytes(encoded.as_deref())
    }

    pub fn finish(&self) -> [u8; 32] {
        *self.hasher.finalize().as_bytes()
    }
}

fn write_sorted_json(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_sorted_json(&Value::String(key.clone()), out);
                out.push(b':');
                if let Some(inner) = map.get(key) {
                    write_sorted_json(inner, out);
                }
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_sorted_json(item, out);
            }
            out.push(b']');
        }
        scalar => {
            // Scalars serialize infallibly.
            if let Ok(bytes) = serde_json::to_vec(scalar) {
                out.extend_from_slice(&bytes);
            }
        }
    }
}
