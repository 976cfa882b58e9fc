// Printer name translation between SMB share names and display names

/// Building codes and the building names printers are labelled with.
/// No two codes share a name.
pub const BUILDINGS: &[(&str, &str)] = &[
    ("1530", "matematik"),
    ("5335", "nygaard"),
    ("5340", "babbage"),
    ("5341", "turing"),
    ("5342", "ada"),
    ("5343", "bush"),
    ("5344", "benjamin"),
    ("5345", "dreyer"),
    ("5346", "hopper"),
    ("5347", "wiener"),
];

/// Marks spooler queues installed by auprint.
pub const QUEUE_MARKER: &str = "auprint-";

pub fn building_name(code: &str) -> Option<&'static str> {
    BUILDINGS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

pub fn building_code(name: &str) -> Option<&'static str> {
    BUILDINGS
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(code, _)| *code)
}

/// Turns `5341-101-color` into `turing-101-color`.
///
/// Names with a single segment and names whose first segment is not a known
/// building code come back unchanged.
pub fn to_display_name(raw_name: &str) -> String {
    let parts: Vec<&str> = raw_name.split('-').collect();
    if parts.len() < 2 {
        return raw_name.to_string();
    }

    let building = building_name(parts[0]).unwrap_or(parts[0]);
    std::iter::once(building)
        .chain(parts[1..].iter().copied())
        .collect::<Vec<_>>()
        .join("-")
}

/// Maps a building name to its code. Anything else is assumed to already be
/// a code and is returned as given.
pub fn building_name_to_code(input: &str) -> String {
    let input = input.trim();
    building_code(input).unwrap_or(input).to_string()
}

/// Inverse of [`to_display_name`] for display names built from a known
/// building.
pub fn to_raw_name(display_name: &str) -> String {
    match display_name.split_once('-') {
        Some((building, rest)) => format!("{}-{}", building_name_to_code(building), rest),
        None => display_name.to_string(),
    }
}

pub fn mangle(name: &str) -> String {
    format!("{}{}", QUEUE_MARKER, name)
}

/// Strips the queue marker, or returns `None` for queues auprint does not own.
pub fn demangle(queue_name: &str) -> Option<String> {
    queue_name
        .strip_prefix(QUEUE_MARKER)
        .map(str::to_string)
}
