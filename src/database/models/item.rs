use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::geo::{Located, Point};

/// A persisted, geotagged item. `owner` is an identity id and is not
/// guaranteed to resolve at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub item_name: String,
    pub weight: f64,
    pub filename: String,
    pub birthdate: NaiveDate,
    pub location: Point,
    pub owner: String,
}

impl Located for Item {
    fn location(&self) -> Point {
        self.location
    }
}

/// Row layout of the `items` table; location is kept as two columns
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub item_name: String,
    pub weight: f64,
    pub filename: String,
    pub birthdate: NaiveDate,
    pub lat: f64,
    pub lng: f64,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            item_name: row.item_name,
            weight: row.weight,
            filename: row.filename,
            birthdate: row.birthdate,
            location: Point::new(row.lat, row.lng),
            owner: row.owner,
        }
    }
}

/// Fields a caller supplies on create. The owner is never part of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    pub item_name: String,
    pub weight: f64,
    pub filename: String,
    pub birthdate: NaiveDate,
    pub location: Point,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<Point>,
}

impl ItemPatch {
    pub fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.item_name {
            item.item_name = name.clone();
        }
        if let Some(weight) = self.weight {
            item.weight = weight;
        }
        if let Some(filename) = &self.filename {
            item.filename = filename.clone();
        }
        if let Some(birthdate) = self.birthdate {
            item.birthdate = birthdate;
        }
        if let Some(location) = self.location {
            item.location = location;
        }
    }
}
