use std::collections::HashMap;
use std::sync::OnceLock;

use super::OpSchema;

/// Link-time registry of schema catalogs; each entry returns the schemas of one domain.
#[linkme::distributed_slice]
pub static OP_SCHEMA_SETS: [fn() -> Vec<OpSchema>] = [..];

type Catalog = HashMap<&'static str, HashMap<&'static str, OpSchema>>;

static CATALOG: OnceLock<Catalog> = OnceLock::new();

fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| {
        let mut catalog: Catalog = HashMap::new();
        for schemas in OP_SCHEMA_SETS.iter() {
            for schema in schemas() {
                catalog
                    .entry(schema.domain)
                    .or_default()
                    .insert(schema.op_type, schema);
            }
        }
        catalog
    })
}

/// Looks up the schema registered for `op_type` in `domain`.
pub fn find_op_schema(op_type: &str, domain: &str) -> Option<&'static OpSchema> {
    catalog().get(domain)?.get(op_type)
}

