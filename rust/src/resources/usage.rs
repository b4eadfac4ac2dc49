//! Capacity tracking for one scheduling pass.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use super::Resource;

/// Slack allowed when comparing booked load against capacity.
pub(crate) const CAPACITY_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct Booking {
    start: NaiveDate,
    end: NaiveDate,
    quantity: f64,
}

/// Bookings per resource, each list sorted by start date.
///
/// Unlike a busy/free schedule, bookings may overlap: a resource with
/// capacity 2.0 can carry two 1.0 bookings on the same day.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResourceUsage {
    bookings: FxHashMap<String, Vec<Booking>>,
}

impl ResourceUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&mut self, resource_id: &str, start: NaiveDate, end: NaiveDate, quantity: f64) {
        let bookings = self.bookings.entry(resource_id.to_string()).or_default();
        let idx = bookings.partition_point(|b| b.start <= start);
        bookings.insert(
            idx,
            Booking {
                start,
                end,
                quantity,
            },
        );
    }

    /// Total quantity booked on `resource_id` for `date`.
    pub fn load_on(&self, resource_id: &str, date: NaiveDate) -> f64 {
        let Some(bookings) = self.bookings.get(resource_id) else {
            return 0.0;
        };
        // Bookings starting after `date` cannot cover it.
        let upper = bookings.partition_point(|b| b.start <= date);
        bookings[..upper]
            .iter()
            .filter(|b| b.end >= date)
            .map(|b| b.quantity)
            .sum()
    }

    /// Latest date in `[start, end]` on which `resource` cannot take
    /// `quantity` more, or `None` when the whole range fits.
    pub fn last_conflict(
        &self,
        resource: &Resource,
        start: NaiveDate,
        end: NaiveDate,
        quantity: f64,
    ) -> Option<NaiveDate> {
        let unavailable = resource.unavailable_between(start, end).next_back();
        let floor = unavailable.unwrap_or(start);

        let mut date = end;
        while date >= floor {
            if Some(date) == unavailable
                || self.load_on(resource.id(), date) + quantity > resource.capacity() + CAPACITY_TOLERANCE
            {
                return Some(date);
            }
            date = date.pred_opt()?;
        }
        unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceType;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_load_sums_overlapping_bookings() {
        let mut usage = ResourceUsage::new();
        usage.book("r", d(2025, 1, 13), d(2025, 1, 15), 1.0);
        usage.book("r", d(2025, 1, 15), d(2025, 1, 16), 0.5);
        usage.book("r", d(2025, 1, 10), d(2025, 1, 13), 0.25);
        assert_eq!(usage.load_on("r", d(2025, 1, 13)), 1.25);
        assert_eq!(usage.load_on("r", d(2025, 1, 15)), 1.5);
        assert_eq!(usage.load_on("r", d(2025, 1, 17)), 0.0);
        assert_eq!(usage.load_on("other", d(2025, 1, 15)), 0.0);
    }

    #[test]
    fn test_last_conflict_finds_latest_blocked_date() {
        let resource = Resource::with_default_capacity("r", "R", ResourceType::Person);
        let mut usage = ResourceUsage::new();
        usage.book("r", d(2025, 1, 14), d(2025, 1, 15), 1.0);

        assert_eq!(
            usage.last_conflict(&resource, d(2025, 1, 13), d(2025, 1, 17), 1.0),
            Some(d(2025, 1, 15))
        );
        assert_eq!(
            usage.last_conflict(&resource, d(2025, 1, 16), d(2025, 1, 17), 1.0),
            None
        );
    }

    #[test]
    fn test_last_conflict_respects_unavailable_dates() {
        let resource = Resource::new("r", "R", ResourceType::Equipment, 2.0)
            .unwrap()
            .with_unavailable_dates([d(2025, 1, 16)]);
        let mut usage = ResourceUsage::new();
        usage.book("r", d(2025, 1, 13), d(2025, 1, 13), 2.0);

        assert_eq!(
            usage.last_conflict(&resource, d(2025, 1, 13), d(2025, 1, 15), 1.0),
            Some(d(2025, 1, 13))
        );
        assert_eq!(
            usage.last_conflict(&resource, d(2025, 1, 13), d(2025, 1, 17), 1.0),
            Some(d(2025, 1, 16))
        );
        assert_eq!(
            usage.last_conflict(&resource, d(2025, 1, 14), d(2025, 1, 15), 2.0),
            None
        );
    }
}
