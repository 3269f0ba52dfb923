use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::datapackage::{KeyedRow, TableSchema};
use crate::decode::{self, FieldDescriptor, FieldValue};
use crate::error::OppError;

/// Projects one keyed row onto store field paths using the ontology
/// mapping for its resource type. Cells without an ontology-tagged,
/// mapped field are dropped.
#[derive(Debug)]
pub struct RowMapper {
    descriptors: Vec<FieldDescriptor>,
}

impl RowMapper {
    /// Build descriptors for every schema field whose `rdfType` appears in
    /// the store mapping table.
    pub fn new(
        schema: &TableSchema,
        store_fields: &BTreeMap<String, String>,
    ) -> Result<Self, OppError> {
        let mut descriptors = Vec::new();
        for field in &schema.fields {
            let Some(rdf_type) = field.rdf_type.as_deref() else {
                continue;
            };
            let Some(store_field) = store_fields.get(rdf_type) else {
                continue;
            };
            descriptors.push(FieldDescriptor::from_schema(field, store_field)?);
        }
        Ok(Self { descriptors })
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Decode every mapped cell and place it at its store field path.
    /// When several source fields map to one path, the slot is promoted to
    /// a list that preserves encounter order.
    pub fn map_row(&self, cells: &KeyedRow) -> Result<BTreeMap<String, FieldValue>, OppError> {
        let mut row = BTreeMap::new();
        for (name, raw) in cells {
            let Some(descriptor) = self
                .descriptors
                .iter()
                .find(|descriptor| &descriptor.field_name == name)
            else {
                continue;
            };
            let value = decode::decode(raw, descriptor)?;
            match row.entry(descriptor.store_field.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    FieldValue::List(values) => values.push(value),
                    existing => {
                        let first = std::mem::replace(existing, FieldValue::Null);
                        *existing = FieldValue::List(vec![first, value]);
                    }
                },
            }
        }
        Ok(row)
    }
}
