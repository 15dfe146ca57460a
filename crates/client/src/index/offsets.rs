//! Precomputed offsets of frequently accessed columns.
//!
//! `None` means the column is absent from the header; consumers check before use.

use dispatch_core::config::{AssignmentColumns, RequestColumns, RiderColumns, SettingsColumns};
use serde::Serialize;

use super::HeaderIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiderOffsets {
    pub name: Option<usize>,
    pub id: Option<usize>,
    pub status: Option<usize>,
    pub phone: Option<usize>,
    pub email: Option<usize>,
}

impl RiderOffsets {
    pub fn resolve(header: &HeaderIndex, columns: &RiderColumns) -> Self {
        Self {
            name: header.offset(&columns.name),
            id: header.offset(&columns.id),
            status: header.offset(&columns.status),
            phone: header.offset(&columns.phone),
            email: header.offset(&columns.email),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestOffsets {
    pub id: Option<usize>,
    pub date: Option<usize>,
    pub requester: Option<usize>,
    pub riders_needed: Option<usize>,
    pub status: Option<usize>,
}

impl RequestOffsets {
    pub fn resolve(header: &HeaderIndex, columns: &RequestColumns) -> Self {
        Self {
            id: header.offset(&columns.id),
            date: header.offset(&columns.date),
            requester: header.offset(&columns.requester),
            riders_needed: header.offset(&columns.riders_needed),
            status: header.offset(&columns.status),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentOffsets {
    pub id: Option<usize>,
    pub request_id: Option<usize>,
    pub rider_name: Option<usize>,
    pub status: Option<usize>,
    pub event_date: Option<usize>,
}

impl AssignmentOffsets {
    pub fn resolve(header: &HeaderIndex, columns: &AssignmentColumns) -> Self {
        Self {
            id: header.offset(&columns.id),
            request_id: header.offset(&columns.request_id),
            rider_name: header.offset(&columns.rider_name),
            status: header.offset(&columns.status),
            event_date: header.offset(&columns.event_date),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SettingsOffsets {
    pub key: Option<usize>,
    pub value: Option<usize>,
}

impl SettingsOffsets {
    pub fn resolve(header: &HeaderIndex, columns: &SettingsColumns) -> Self {
        Self { key: header.offset(&columns.key), value: header.offset(&columns.value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::store::text_row;

    #[test]
    fn test_rider_offsets_follow_configured_names() {
        let header = HeaderIndex::from_header(&text_row(&["Rider ID", "Full Name", "Status"]));
        let offsets = RiderOffsets::resolve(&header, &RiderColumns::default());
        assert_eq!(offsets.id, Some(0));
        assert_eq!(offsets.name, Some(1));
        assert_eq!(offsets.status, Some(2));
        assert_eq!(offsets.phone, None);
    }

    #[test]
    fn test_renamed_column_needs_only_config() {
        let header = HeaderIndex::from_header(&text_row(&["Rider", "Badge"]));
        let columns = RiderColumns { name: "Rider".into(), id: "Badge".into(), ..Default::default() };
        let offsets = RiderOffsets::resolve(&header, &columns);
        assert_eq!((offsets.name, offsets.id), (Some(0), Some(1)));
    }

    #[test]
    fn test_empty_header_gives_undefined_offsets() {
        let offsets = RequestOffsets::resolve(&HeaderIndex::default(), &RequestColumns::default());
        assert_eq!(offsets, RequestOffsets::default());
    }
}
