/// One named value handed to the target.
///
/// `bytes` are kept exactly as the target received them, i.e. in
/// little-endian order: `bytes[0]` is the least significant byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Field {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Hex digits of the field's numeric value, most significant byte first.
    pub fn hex_value(&self) -> String {
        let mut big_endian = self.bytes.clone();
        big_endian.reverse();
        hex::encode(big_endian)
    }
}

/// Everything captured during a single invocation of the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRecord {
    index: u64,
    fields: Vec<Field>,
    byte_count: usize,
    is_new: bool,
}

impl RunRecord {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn mark_new(&mut self) {
        self.is_new = true;
    }

    pub(crate) fn push_field(&mut self, field: Field) {
        self.byte_count += field.bytes.len();
        self.fields.push(field);
    }

    /// Renders the persisted form: one `<name>: 0x<hex>` line per field, in
    /// call order.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.byte_count * 2 + self.fields.len() * 16);
        for field in &self.fields {
            out.push_str(&field.name);
            out.push_str(": 0x");
            out.push_str(&field.hex_value());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_value_is_most_significant_byte_first() {
        let field = Field::new("x", 0x1234_abcdu32.to_le_bytes().to_vec());
        assert_eq!(field.hex_value(), "1234abcd");
    }

    #[test]
    fn pushing_fields_tracks_byte_count() {
        let mut record = RunRecord::new(3);
        assert_eq!(record.index(), 3);
        assert_eq!(record.byte_count(), 0);
        assert!(!record.is_new());

        record.push_field(Field::new("a", vec![1, 2, 3, 4]));
        record.push_field(Field::new("b", vec![5]));
        assert_eq!(record.byte_count(), 5);
        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.fields()[1].name, "b");

        record.mark_new();
        assert!(record.is_new());
    }

    #[test]
    fn render_writes_one_line_per_field_in_call_order() {
        let mut record = RunRecord::new(0);
        record.push_field(Field::new("x", vec![0x78, 0x56, 0x34, 0x12]));
        record.push_field(Field::new("flag", vec![0x01]));
        record.push_field(Field::new("empty", vec![]));
        assert_eq!(record.render(), "x: 0x12345678\nflag: 0x01\nempty: 0x\n");
    }

    #[test]
    fn empty_record_renders_nothing() {
        assert_eq!(RunRecord::new(0).render(), "");
    }
}
