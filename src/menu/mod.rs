//! Menu Catalog
//!
//! Read and write access to menu items. Items carry a surrogate `itemId`; names
//! are still how users address items, so mutations resolve a name to exactly one
//! id first and refuse ambiguous names.
//!
//! Item names are unique in the reference schema; the name checks here give a
//! clear error up front and the index settles races between sessions. Tables
//! created without the index may still hold duplicates, which mutations refuse
//! as ambiguous.
//!
//! Listing order is ascending `itemId`, i.e. creation order. Name lookups for
//! mutations are exact; searches follow the `case_insensitive_search` setting.
//!
//! Role checks are not done here. The session authorizes `ManageMenu` against
//! the caller's live role before calling [`MenuCatalog::add_item`],
//! [`MenuCatalog::update_field`] or [`MenuCatalog::delete_item`].

use std::fmt;

use crate::engine::{QueryExecutor, Row, SqlParam};
use crate::error::{CafeError, Result};
use crate::money::Money;

const SELECT_ITEMS: &str =
    "SELECT itemId, itemName, type, CAST(price AS TEXT), description, imageURL FROM Menu";

/// A stored menu item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub item_type: String,
    pub price: Money,
    pub description: String,
    pub image_url: String,
}

impl MenuItem {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.integer(0, "itemId")?,
            name: row.required(1, "itemName")?.to_string(),
            item_type: row.text(2),
            price: Money::parse(row.required(3, "price")?)
                .map_err(|e| CafeError::persistence(format!("stored price is invalid: {e}")))?,
            description: row.text(4),
            image_url: row.text(5),
        })
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) ${}", self.name, self.item_type, self.price)?;
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        Ok(())
    }
}

/// Values for a new menu item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuItem {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub item_type: String,
    pub image_url: String,
}

/// Editable menu item attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuField {
    Name,
    Description,
    Price,
    Type,
    ImageUrl,
}

impl MenuField {
    pub const ALL: [Self; 5] = [Self::Name, Self::Description, Self::Price, Self::Type, Self::ImageUrl];

    const fn column(self) -> &'static str {
        match self {
            Self::Name => "itemName",
            Self::Description => "description",
            Self::Price => "price",
            Self::Type => "type",
            Self::ImageUrl => "imageURL",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::Type => "type",
            Self::ImageUrl => "image URL",
        }
    }
}

pub struct MenuCatalog<'a, Q> {
    db: &'a Q,
    case_insensitive_search: bool,
}

impl<'a, Q: QueryExecutor> MenuCatalog<'a, Q> {
    #[must_use]
    pub const fn new(db: &'a Q, case_insensitive_search: bool) -> Self {
        Self { db, case_insensitive_search }
    }

    /// All items in creation order
    pub async fn list(&self) -> Result<Vec<MenuItem>> {
        self.select(&format!("{SELECT_ITEMS} ORDER BY itemId"), &[]).await
    }

    pub async fn search_by_name(&self, name: &str) -> Result<Vec<MenuItem>> {
        self.search("itemName", name).await
    }

    pub async fn search_by_type(&self, item_type: &str) -> Result<Vec<MenuItem>> {
        self.search("type", item_type).await
    }

    /// Insert a new item
    ///
    /// # Errors
    /// * `Validation` if the name is empty
    /// * `DuplicateItem` if an item with the same name exists
    pub async fn add_item(&self, item: &NewMenuItem) -> Result<MenuItem> {
        let name = item.name.trim();
        if name.is_empty() {
            return Err(CafeError::validation("item name cannot be empty"));
        }
        if !self.find_exact(name).await?.is_empty() {
            return Err(CafeError::DuplicateItem(name.to_string()));
        }

        let rows = self
            .db
            .query(
                "INSERT INTO Menu (itemName, type, price, description, imageURL) \
                 VALUES ($1, $2, CAST(CAST($3 AS TEXT) AS NUMERIC), $4, $5) RETURNING itemId",
                &[
                    SqlParam::text(name),
                    SqlParam::text(item.item_type.as_str()),
                    SqlParam::Text(item.price.to_string()),
                    SqlParam::text(item.description.as_str()),
                    SqlParam::text(item.image_url.as_str()),
                ],
            )
            .await
            .map_err(|e| match e {
                CafeError::UniqueViolation(_) => CafeError::DuplicateItem(name.to_string()),
                other => other,
            })?;

        let id = rows
            .first()
            .ok_or_else(|| CafeError::persistence("insert returned no itemId"))?
            .integer(0, "itemId")?;

        tracing::info!(item = name, item_id = id, price = %item.price, "menu item added");
        Ok(MenuItem {
            id,
            name: name.to_string(),
            item_type: item.item_type.clone(),
            price: item.price,
            description: item.description.clone(),
            image_url: item.image_url.clone(),
        })
    }

    /// Change one attribute of the single item called `name`
    ///
    /// # Errors
    /// * `NotFound` if no item has that name
    /// * `AmbiguousTarget` if several items do
    /// * `Validation` for an empty name or a malformed price
    /// * `DuplicateItem` when renaming onto an existing name
    pub async fn update_field(&self, name: &str, field: MenuField, value: &str) -> Result<()> {
        let target = self.resolve_single(name).await?;

        let mut new_name = None;
        let (assignment, param) = match field {
            MenuField::Price => {
                let price = Money::parse(value)?;
                ("price = CAST(CAST($1 AS TEXT) AS NUMERIC)".to_string(), SqlParam::Text(price.to_string()))
            }
            MenuField::Name => {
                let renamed = value.trim();
                if renamed.is_empty() {
                    return Err(CafeError::validation("item name cannot be empty"));
                }
                if renamed != target.name && !self.find_exact(renamed).await?.is_empty() {
                    return Err(CafeError::DuplicateItem(renamed.to_string()));
                }
                new_name = Some(renamed);
                (format!("{} = $1", field.column()), SqlParam::text(renamed))
            }
            _ => (format!("{} = $1", field.column()), SqlParam::text(value)),
        };

        let updated = self
            .db
            .execute(
                &format!("UPDATE Menu SET {assignment} WHERE itemId = $2"),
                &[param, SqlParam::Integer(target.id)],
            )
            .await
            .map_err(|e| match (e, new_name) {
                (CafeError::UniqueViolation(_), Some(renamed)) => {
                    CafeError::DuplicateItem(renamed.to_string())
                }
                (other, _) => other,
            })?;

        if updated == 0 {
            // Deleted by another session between lookup and update
            return Err(CafeError::not_found(format!("menu item '{name}'")));
        }

        tracing::info!(item = name, item_id = target.id, field = field.label(), "menu item updated");
        Ok(())
    }

    /// Remove every item called `name`, returning how many were removed
    ///
    /// # Errors
    /// * `NotFound` if no item has that name
    pub async fn delete_item(&self, name: &str) -> Result<u64> {
        let deleted = self
            .db
            .execute("DELETE FROM Menu WHERE itemName = $1", &[SqlParam::text(name)])
            .await?;

        if deleted == 0 {
            return Err(CafeError::not_found(format!("menu item '{name}'")));
        }

        tracing::info!(item = name, deleted, "menu item deleted");
        Ok(deleted)
    }

    async fn search(&self, column: &str, value: &str) -> Result<Vec<MenuItem>> {
        let sql = if self.case_insensitive_search {
            format!("{SELECT_ITEMS} WHERE LOWER({column}) = LOWER($1) ORDER BY itemId")
        } else {
            format!("{SELECT_ITEMS} WHERE {column} = $1 ORDER BY itemId")
        };
        self.select(&sql, &[SqlParam::text(value)]).await
    }

    async fn find_exact(&self, name: &str) -> Result<Vec<MenuItem>> {
        self.select(
            &format!("{SELECT_ITEMS} WHERE itemName = $1 ORDER BY itemId"),
            &[SqlParam::text(name)],
        )
        .await
    }

    async fn resolve_single(&self, name: &str) -> Result<MenuItem> {
        let mut matches = self.find_exact(name).await?;
        match matches.len() {
            0 => Err(CafeError::not_found(format!("menu item '{name}'"))),
            1 => Ok(matches.remove(0)),
            _ => Err(CafeError::AmbiguousTarget(name.to_string())),
        }
    }

    async fn select(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<MenuItem>> {
        self.db.query(sql, params).await?.iter().map(MenuItem::from_row).collect()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::engine::sqlite::SqliteExecutor;
    use crate::schema::install_schema;
    use pretty_assertions::assert_eq;

    async fn store() -> SqliteExecutor {
        let executor = SqliteExecutor::open_in_memory().unwrap();
        install_schema(&executor).await.unwrap();
        executor
    }

    /// Store whose Menu table predates the unique name index
    async fn legacy_store_with_duplicate_bagels() -> SqliteExecutor {
        let db = store().await;
        db.execute("DROP INDEX menu_item_name", &[]).await.unwrap();
        for _ in 0..2 {
            db.execute(
                "INSERT INTO Menu (itemName, type, price) VALUES ($1, $2, 1)",
                &[SqlParam::text("Bagel"), SqlParam::text("food")],
            )
            .await
            .unwrap();
        }
        db
    }

    fn item(name: &str, price: &str, item_type: &str) -> NewMenuItem {
        NewMenuItem {
            name: name.to_string(),
            description: format!("{name} description"),
            price: Money::parse(price).unwrap(),
            item_type: item_type.to_string(),
            image_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_add_then_search_by_name() {
        let db = store().await;
        let catalog = MenuCatalog::new(&db, false);

        catalog.add_item(&item("Espresso", "2.00", "drink")).await.unwrap();

        let found = catalog.search_by_name("Espresso").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].price, Money::from_cents(200));
        assert_eq!(found[0].price.to_string(), "2.00");
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let db = store().await;
        let catalog = MenuCatalog::new(&db, false);
        for name in ["Scone", "Americano", "Muffin"] {
            catalog.add_item(&item(name, "1", "food")).await.unwrap();
        }

        let names: Vec<String> = catalog.list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Scone", "Americano", "Muffin"]);
    }

    #[tokio::test]
    async fn test_search_case_sensitivity_follows_setting() {
        let db = store().await;
        MenuCatalog::new(&db, false).add_item(&item("Latte", "3.50", "Drink")).await.unwrap();

        assert!(MenuCatalog::new(&db, false).search_by_name("latte").await.unwrap().is_empty());
        assert_eq!(MenuCatalog::new(&db, true).search_by_name("latte").await.unwrap().len(), 1);
        assert_eq!(MenuCatalog::new(&db, true).search_by_type("drink").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = store().await;
        let catalog = MenuCatalog::new(&db, false);
        catalog.add_item(&item("Mocha", "4", "drink")).await.unwrap();

        let err = catalog.add_item(&item("Mocha", "5", "drink")).await.unwrap_err();
        assert!(matches!(err, CafeError::DuplicateItem(_)));
    }

    #[tokio::test]
    async fn test_update_price_and_rename() {
        let db = store().await;
        let catalog = MenuCatalog::new(&db, false);
        catalog.add_item(&item("Tea", "1.50", "drink")).await.unwrap();
        catalog.add_item(&item("Cocoa", "2.50", "drink")).await.unwrap();

        catalog.update_field("Tea", MenuField::Price, "1.75").await.unwrap();
        assert_eq!(catalog.search_by_name("Tea").await.unwrap()[0].price, Money::from_cents(175));

        let err = catalog.update_field("Tea", MenuField::Price, "-1").await.unwrap_err();
        assert!(matches!(err, CafeError::Validation(_)));

        let err = catalog.update_field("Tea", MenuField::Name, "Cocoa").await.unwrap_err();
        assert!(matches!(err, CafeError::DuplicateItem(_)));

        catalog.update_field("Tea", MenuField::Name, "Green Tea").await.unwrap();
        assert!(catalog.search_by_name("Tea").await.unwrap().is_empty());
        assert_eq!(catalog.search_by_name("Green Tea").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_ambiguous_and_missing() {
        let db = legacy_store_with_duplicate_bagels().await;
        let catalog = MenuCatalog::new(&db, false);

        let err = catalog.update_field("Bagel", MenuField::Type, "bread").await.unwrap_err();
        assert!(matches!(err, CafeError::AmbiguousTarget(_)));
        // Nothing changed
        assert!(catalog.search_by_type("bread").await.unwrap().is_empty());

        let err = catalog.update_field("Croissant", MenuField::Type, "bread").await.unwrap_err();
        assert!(matches!(err, CafeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_all_matches() {
        let db = legacy_store_with_duplicate_bagels().await;
        let catalog = MenuCatalog::new(&db, false);

        assert_eq!(catalog.delete_item("Bagel").await.unwrap(), 2);
        assert!(catalog.list().await.unwrap().is_empty());
        assert!(matches!(catalog.delete_item("Bagel").await, Err(CafeError::NotFound(_))));
    }
}
