/// Arrow schema definitions for tariff fact data.
pub mod facts {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Schema for the canonical fact table.
    ///
    /// Dates and rates stay `Utf8`: dates may be non-calendar periods and a
    /// rate column carries both numeric percentages and sentinel text.
    pub fn fact_schema() -> Schema {
        Schema::new(vec![
            Field::new("fact_id", DataType::Int64, false),
            Field::new("doc_id", DataType::Int64, false),
            Field::new("issuing_jurisdiction", DataType::Utf8, true),
            Field::new("country", DataType::Utf8, true),
            Field::new("hs_code", DataType::Utf8, true),
            Field::new("duty_type", DataType::Utf8, true),
            Field::new("duty_rate", DataType::Utf8, true),
            Field::new("effective_from", DataType::Utf8, true),
            Field::new("effective_to", DataType::Utf8, true),
            Field::new("period_from", DataType::Utf8, true),
            Field::new("period_to", DataType::Utf8, true),
            Field::new("basis_law", DataType::Utf8, true),
            Field::new("company", DataType::Utf8, true),
            Field::new("case_number", DataType::Utf8, true),
            Field::new("product_description", DataType::Utf8, true),
            Field::new("note", DataType::Utf8, true),
        ])
    }

    /// Schema for document metadata rows.
    pub fn document_schema() -> Schema {
        Schema::new(vec![
            Field::new("doc_id", DataType::Int64, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("issuing_jurisdiction", DataType::Utf8, true),
            Field::new("total_pages", DataType::Int64, true),
            Field::new("file_size", DataType::Int64, true),
            Field::new("processing_mode", DataType::Utf8, true),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::facts;

    #[test]
    fn fact_schema_has_expected_fields() {
        let schema = facts::fact_schema();
        assert_eq!(schema.fields().len(), 16);
        assert!(schema.field_with_name("fact_id").is_ok());
        assert!(schema.field_with_name("duty_rate").is_ok());
    }

    #[test]
    fn document_schema_has_expected_fields() {
        let schema = facts::document_schema();
        assert_eq!(schema.fields().len(), 7);
        assert!(schema.field_with_name("file_name").is_ok());
    }
}
