use std::sync::Arc;

use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Table, row};
use serde::Serialize;
use tenant_resolver::TenantDescriptor;
use tenant_resolver::resolver::ResolveResult;

/// The outcome of resolving one code given on the command line.
#[derive(Debug, Serialize)]
pub struct Lookup {
    /// The code as it was given, before trimming.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<TenantDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Lookup {
    pub fn new(code: String, result: ResolveResult) -> Self {
        match result {
            Ok(tenant) => Self {
                code,
                tenant: Some(tenant),
                error: None,
            },
            Err(error) => Self {
                code,
                tenant: None,
                error: Some(format!("{:#}", anyhow::Error::new(error))),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.tenant.is_some()
    }
}

pub fn print_json(lookups: &[Lookup]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(lookups)?;
    println!("{json}");
    Ok(())
}

pub fn print_compact(lookups: &[Lookup]) {
    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(row![b => "Code", "ID", "Name", "Status"]);

    for lookup in lookups {
        match (&lookup.tenant, &lookup.error) {
            (Some(tenant), _) => {
                table.add_row(row![lookup.code, r->tenant.id, tenant.name, "ok"]);
            }
            (None, error) => {
                let error = error.as_deref().unwrap_or("unknown error");
                table.add_row(row![lookup.code, "", "", error]);
            }
        }
    }

    table.printstd();
}
