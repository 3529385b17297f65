use crate::model::DimensionRecord;
use crate::scad::format_number;
use std::fmt::Write as _;

/// Plain-text `key = value` listing of every record field, one per line.
pub fn dump_record(record: &DimensionRecord) -> String {
    let mut out = String::new();
    let mut field = |key: &str, value: String| {
        let _ = writeln!(out, "{key} = {value}");
    };

    field("width", format_number(record.width));
    field("depth", format_number(record.depth));
    field("height", format_number(record.height));
    field("fillet.radius", format_number(record.fillet.radius));
    field("fillet.height", format_number(record.fillet.height));
    field("fillet.corner", record.fillet.corner.name().to_string());

    match &record.hole {
        None => field("hole", "none".to_string()),
        Some(hole) => {
            field("hole.diameter", format_number(hole.diameter));
            field("hole.axis", hole.axis.label().to_string());
            field(
                "hole.center",
                format!(
                    "[{}, {}, {}]",
                    format_number(hole.center.x),
                    format_number(hole.center.y),
                    format_number(hole.center.z)
                ),
            );
            field("hole.through_all", hole.through_all.to_string());
            field(
                "hole.length",
                hole.length
                    .map(format_number)
                    .unwrap_or_else(|| "none".to_string()),
            );
        }
    }

    out
}
