//! Shared dataset fixtures for tool tests.

use chrono::NaiveDate;
use flowlens_data::{Column, ColumnData, Dataset, MemorySource, QueryLimits};

/// Validated arguments for a catalog tool, panicking on schema violations.
pub(crate) fn args_for(tool: &str, raw: serde_json::Value) -> crate::ToolArgs {
    let registry = crate::catalog::builtin_registry();
    let spec = registry
        .specs()
        .into_iter()
        .find(|s| s.name == tool)
        .unwrap()
        .clone();
    crate::ToolArgs::validate(&spec, &raw).unwrap()
}

pub(crate) fn source_from(columns: Vec<Column>) -> MemorySource {
    let dataset = Dataset::from_columns(columns);
    MemorySource::from_dataset(dataset, "pipeline_data", QueryLimits::default()).unwrap()
}

fn day(d: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Small well-formed table: two pipelines over eight gas days.
pub(crate) fn sample_source() -> MemorySource {
    source_from(vec![
        Column {
            name: "pipeline_name".into(),
            data: ColumnData::Text(
                ["Pipeline A", "Pipeline A", "Pipeline B", "Pipeline B", "Pipeline A",
                 "Pipeline B", "Pipeline A", "Pipeline B"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ),
        },
        Column {
            name: "region".into(),
            data: ColumnData::Text(
                ["south", "south", "north", "north", "south", "north", "south", "north"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ),
        },
        Column {
            name: "qty".into(),
            data: ColumnData::Float(vec![
                Some(10.0),
                Some(20.0),
                Some(30.0),
                Some(40.0),
                None,
                Some(50.0),
                Some(25.0),
                Some(60.0),
            ]),
        },
        Column {
            name: "capacity".into(),
            data: ColumnData::Float(vec![Some(100.0); 8]),
        },
        Column {
            name: "gas_day".into(),
            data: ColumnData::Timestamp((1..=8).map(|d| Some(day(d))).collect(),
            ),
        },
    ])
}

/// Larger table seeded with deliberate quality problems: sentinel
/// placeholders, negative and null quantities, quantities above capacity,
/// out-of-range coordinates, and exact duplicate rows.
pub(crate) fn issues_source() -> MemorySource {
    let n = 60;
    let mut pipeline = Vec::with_capacity(n);
    let mut region = Vec::with_capacity(n);
    let mut qty = Vec::with_capacity(n);
    let mut capacity = Vec::with_capacity(n);
    let mut latitude = Vec::with_capacity(n);
    let mut longitude = Vec::with_capacity(n);
    let mut gas_day = Vec::with_capacity(n);

    for i in 0..n {
        pipeline.push(Some(
            if i % 3 == 0 {
                "Gulf Run"
            } else if i % 3 == 1 {
                "Permian Express"
            } else {
                "Rockies West"
            }
            .to_string(),
        ));
        region.push(Some(if i % 2 == 0 { "south" } else { "west" }.to_string()));

        // Rows 0..4 carry sentinel placeholders, 5..8 are null, 9 and 10
        // are negative, the rest ramp upward.
        qty.push(match i {
            0..=2 => Some(999_999_999.0),
            3 | 4 => Some(999_999.0),
            5..=8 => None,
            9 | 10 => Some(-250.0),
            _ => Some(100.0 + i as f64 * 10.0),
        });

        // Row 12 reports flow above capacity.
        capacity.push(Some(if i == 12 { 50.0 } else { 2_000.0 }));

        // Row 15 sits outside valid coordinate ranges.
        latitude.push(Some(if i == 15 { 123.0 } else { 31.5 }));
        longitude.push(Some(if i == 15 { -200.0 } else { -97.2 }));

        gas_day.push(Some(day((i % 28 + 1) as u32)));
    }

    // Two exact duplicates of row 20.
    for _ in 0..2 {
        pipeline.push(pipeline[20].clone());
        region.push(region[20].clone());
        qty.push(qty[20]);
        capacity.push(capacity[20]);
        latitude.push(latitude[20]);
        longitude.push(longitude[20]);
        gas_day.push(gas_day[20]);
    }

    source_from(vec![
        Column {
            name: "pipeline_name".into(),
            data: ColumnData::Text(pipeline),
        },
        Column {
            name: "region".into(),
            data: ColumnData::Text(region),
        },
        Column {
            name: "scheduled_quantity".into(),
            data: ColumnData::Float(qty),
        },
        Column {
            name: "capacity".into(),
            data: ColumnData::Float(capacity),
        },
        Column {
            name: "latitude".into(),
            data: ColumnData::Float(latitude),
        },
        Column {
            name: "longitude".into(),
            data: ColumnData::Float(longitude),
        },
        Column {
            name: "gas_day".into(),
            data: ColumnData::Timestamp(gas_day),
        },
    ])
}
