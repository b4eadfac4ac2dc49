//! Resources, their types and availability, and the pool that owns them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::ResourceError;

pub const DEFAULT_CAPACITY: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Person,
    Equipment,
    Material,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Person => "person",
            ResourceType::Equipment => "equipment",
            ResourceType::Material => "material",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "person" => Ok(ResourceType::Person),
            "equipment" => Ok(ResourceType::Equipment),
            "material" => Ok(ResourceType::Material),
            _ => Err(ResourceError::UnknownResourceType(s.to_string())),
        }
    }
}

/// A schedulable resource with a per-day capacity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resource {
    id: String,
    name: String,
    resource_type: ResourceType,
    capacity: f64,
    unavailable_dates: BTreeSet<NaiveDate>,
}

impl Resource {
    /// Create a resource; capacity must be positive and finite.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        resource_type: ResourceType,
        capacity: f64,
    ) -> Result<Self, ResourceError> {
        let id = id.into();
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ResourceError::InvalidCapacity {
                resource: id,
                capacity,
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            resource_type,
            capacity,
            unavailable_dates: BTreeSet::new(),
        })
    }

    /// A resource with [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity(
        id: impl Into<String>,
        name: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource_type,
            capacity: DEFAULT_CAPACITY,
            unavailable_dates: BTreeSet::new(),
        }
    }

    pub fn with_unavailable_dates<I>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.unavailable_dates.extend(dates);
        self
    }

    pub fn add_unavailable_date(&mut self, date: NaiveDate) {
        self.unavailable_dates.insert(date);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn unavailable_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.unavailable_dates
    }

    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        !self.unavailable_dates.contains(&date)
    }

    /// Unavailable dates within `[start, end]`.
    pub fn unavailable_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        // An inverted range yields nothing.
        let dates = (start <= end).then(|| self.unavailable_dates.range(start..=end));
        dates.into_iter().flatten().copied()
    }
}

/// Resources keyed by id, iterated in id order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResourcePool {
    resources: BTreeMap<String, Resource>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> Result<(), ResourceError> {
        if self.resources.contains_key(resource.id()) {
            return Err(ResourceError::DuplicateResource(resource.id().to_string()));
        }
        self.resources.insert(resource.id().to_string(), resource);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Resource, ResourceError> {
        self.resources
            .remove(id)
            .ok_or_else(|| ResourceError::UnknownResource(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub(crate) fn require(&self, id: &str) -> Result<&Resource, ResourceError> {
        self.get(id)
            .ok_or_else(|| ResourceError::UnknownResource(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: ResourceType) -> impl Iterator<Item = &Resource> {
        self.iter()
            .filter(move |r| r.resource_type() == resource_type)
    }

    pub fn available_on(&self, date: NaiveDate) -> impl Iterator<Item = &Resource> {
        self.iter().filter(move |r| r.is_available_on(date))
    }

    pub fn available_of_type_on(
        &self,
        resource_type: ResourceType,
        date: NaiveDate,
    ) -> impl Iterator<Item = &Resource> {
        self.by_type(resource_type)
            .filter(move |r| r.is_available_on(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn pool() -> ResourcePool {
        let mut pool = ResourcePool::new();
        pool.add(Resource::with_default_capacity("alice", "Alice", ResourceType::Person))
            .unwrap();
        pool.add(
            Resource::with_default_capacity("bob", "Bob", ResourceType::Person)
                .with_unavailable_dates([d(2025, 1, 14)]),
        )
        .unwrap();
        pool.add(Resource::new("crane", "Crane", ResourceType::Equipment, 2.0).unwrap())
            .unwrap();
        pool
    }

    #[test]
    fn test_capacity_must_be_positive() {
        assert!(Resource::new("r", "R", ResourceType::Material, 0.0).is_err());
        assert!(Resource::new("r", "R", ResourceType::Material, -1.0).is_err());
        assert!(Resource::new("r", "R", ResourceType::Material, f64::NAN).is_err());
        let r = Resource::with_default_capacity("r", "R", ResourceType::Material);
        assert_eq!(r.capacity(), 1.0);
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let mut pool = pool();
        assert_eq!(
            pool.add(Resource::with_default_capacity("alice", "A2", ResourceType::Person)),
            Err(ResourceError::DuplicateResource("alice".to_string()))
        );
        assert_eq!(
            pool.remove("nobody"),
            Err(ResourceError::UnknownResource("nobody".to_string()))
        );
        assert_eq!(pool.remove("alice").unwrap().name(), "Alice");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_queries() {
        let pool = pool();
        let people: Vec<&str> = pool.by_type(ResourceType::Person).map(|r| r.id()).collect();
        assert_eq!(people, vec!["alice", "bob"]);

        let available: Vec<&str> = pool.available_on(d(2025, 1, 14)).map(|r| r.id()).collect();
        assert_eq!(available, vec!["alice", "crane"]);

        let available: Vec<&str> = pool
            .available_of_type_on(ResourceType::Person, d(2025, 1, 15))
            .map(|r| r.id())
            .collect();
        assert_eq!(available, vec!["alice", "bob"]);

        assert_eq!(pool.ids().collect::<Vec<_>>(), vec!["alice", "bob", "crane"]);
    }

    #[test]
    fn test_unavailable_between() {
        let resource = Resource::with_default_capacity("alice", "Alice", ResourceType::Person)
            .with_unavailable_dates([d(2025, 1, 14), d(2025, 1, 16), d(2025, 1, 20)]);
        let dates: Vec<NaiveDate> = resource.unavailable_between(d(2025, 1, 14), d(2025, 1, 16)).collect();
        assert_eq!(dates, vec![d(2025, 1, 14), d(2025, 1, 16)]);
        assert_eq!(resource.unavailable_between(d(2025, 1, 17), d(2025, 1, 13)).count(), 0);
    }

    #[test]
    fn test_resource_type_parsing() {
        assert_eq!("Person".parse::<ResourceType>().unwrap(), ResourceType::Person);
        assert_eq!(" material ".parse::<ResourceType>().unwrap(), ResourceType::Material);
        assert!("robot".parse::<ResourceType>().is_err());
    }
}
