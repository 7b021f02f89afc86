//! Stock persistence: CRUD, filtered listing and embedding scans.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::Deserialize;

use desk_types::{BulkStockUpdate, ConvictionLevel, NewStock, Stock, StockUpdate, ThesisAnalysis};

use crate::db::{
    datetime_column, embedding_column, escape_like, json_column, opt_json_column, vector_to_blob,
    Database,
};
use crate::error::StorageError;

/// Column list shared by every stock SELECT.
const STOCK_COLUMNS: &str = "id, name, ticker, sector, description, notes, tags, price, \
     market_cap, metadata, thesis_analysis, embedding, created_at, updated_at";

/// Filters accepted by the stock listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockFilter {
    /// Substring match over name and ticker
    pub search: Option<String>,
    pub sector: Option<String>,
    pub ticker: Option<String>,
    /// Keep only stocks with (or without) a non-blank investment thesis
    pub has_thesis: Option<bool>,
    pub has_embedding: Option<bool>,
    pub conviction: Option<ConvictionLevel>,
}

fn row_to_stock(row: &Row<'_>) -> rusqlite::Result<Stock> {
    Ok(Stock {
        id: row.get("id")?,
        name: row.get("name")?,
        ticker: row.get("ticker")?,
        sector: row.get("sector")?,
        description: row.get("description")?,
        notes: row.get("notes")?,
        tags: json_column(row, "tags")?,
        price: row.get("price")?,
        market_cap: row.get("market_cap")?,
        metadata: json_column(row, "metadata")?,
        thesis_analysis: opt_json_column(row, "thesis_analysis")?,
        embedding: embedding_column(row, "embedding")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Map a UNIQUE violation on `ticker` to an input error the API can 422.
fn duplicate_ticker_err(err: rusqlite::Error, ticker: &str) -> StorageError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            return StorageError::InvalidInput(format!("ticker {ticker} is already in use"));
        }
    }
    StorageError::Sqlite(err)
}

impl Database {
    /// Insert a stock and return the stored row.
    ///
    /// The ticker is trimmed and uppercased before writing; `date_added` is
    /// stamped into the metadata when the caller did not set it.
    pub fn insert_stock(&self, new: &NewStock) -> Result<Stock, StorageError> {
        let name = new.name.trim();
        let ticker = new.ticker.trim().to_uppercase();
        if name.is_empty() {
            return Err(StorageError::InvalidInput(
                "stock name must not be empty".into(),
            ));
        }
        if ticker.is_empty() {
            return Err(StorageError::InvalidInput(
                "stock ticker must not be empty".into(),
            ));
        }

        let now = Utc::now();
        let mut metadata = new.metadata.clone();
        if metadata.date_added.is_none() {
            metadata.stamp_added(now.date_naive());
        }

        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO stocks (name, ticker, sector, description, notes, tags, price, \
                 market_cap, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    name,
                    ticker,
                    new.sector,
                    new.description,
                    new.notes,
                    serde_json::to_string(&new.tags)?,
                    new.price,
                    new.market_cap,
                    serde_json::to_string(&metadata)?,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| duplicate_ticker_err(e, &ticker))?;
            conn.last_insert_rowid()
        };

        self.require_stock(id)
    }

    pub fn get_stock(&self, id: i64) -> Result<Option<Stock>, StorageError> {
        let conn = self.conn()?;
        let stock = conn
            .query_row(
                &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?1"),
                params![id],
                row_to_stock,
            )
            .optional()?;
        Ok(stock)
    }

    pub fn require_stock(&self, id: i64) -> Result<Stock, StorageError> {
        self.get_stock(id)?
            .ok_or(StorageError::NotFound { kind: "stock", id })
    }

    /// Apply a partial update and return the new row.
    ///
    /// Metadata merges key-by-key; `last_reviewed` is stamped whenever the
    /// update changes the investment thesis. The embedding column is never
    /// written here.
    pub fn update_stock(&self, id: i64, update: &StockUpdate) -> Result<Stock, StorageError> {
        let mut stock = self.require_stock(id)?;
        let old_thesis = stock.metadata.thesis().map(str::to_string);

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StorageError::InvalidInput(
                    "stock name must not be empty".into(),
                ));
            }
            stock.name = name.to_string();
        }
        if let Some(ticker) = &update.ticker {
            let ticker = ticker.trim().to_uppercase();
            if ticker.is_empty() {
                return Err(StorageError::InvalidInput(
                    "stock ticker must not be empty".into(),
                ));
            }
            stock.ticker = ticker;
        }
        if let Some(sector) = &update.sector {
            stock.sector = Some(sector.clone());
        }
        if let Some(description) = &update.description {
            stock.description = Some(description.clone());
        }
        if let Some(notes) = &update.notes {
            stock.notes = Some(notes.clone());
        }
        if let Some(tags) = &update.tags {
            stock.tags = tags.clone();
        }
        if let Some(price) = update.price {
            stock.price = Some(price);
        }
        if let Some(market_cap) = update.market_cap {
            stock.market_cap = Some(market_cap);
        }
        if let Some(metadata) = &update.metadata {
            stock.metadata.merge(metadata.clone());
        }

        let now = Utc::now();
        if stock.metadata.thesis().map(str::to_string) != old_thesis {
            stock.metadata.stamp_reviewed(now.date_naive());
        }
        stock.updated_at = now;

        self.write_stock(&stock)?;
        Ok(stock)
    }

    /// Apply one update to every listed stock. All ids are validated before
    /// any row is written.
    pub fn bulk_update_stocks(
        &self,
        ids: &[i64],
        update: &BulkStockUpdate,
    ) -> Result<Vec<Stock>, StorageError> {
        let mut stocks = Vec::with_capacity(ids.len());
        for &id in ids {
            stocks.push(self.require_stock(id)?);
        }

        let now = Utc::now();
        for stock in &mut stocks {
            if let Some(sector) = &update.sector {
                stock.sector = Some(sector.clone());
            }
            if let Some(tags) = &update.tags {
                stock.tags = tags.clone();
            }
            if let Some(notes) = &update.notes {
                stock.notes = Some(notes.clone());
            }
            stock.updated_at = now;
            self.write_stock(stock)?;
        }
        Ok(stocks)
    }

    pub fn delete_stock(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM stocks WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Filtered listing in ascending id order.
    pub fn list_stocks(&self, filter: &StockFilter) -> Result<Vec<Stock>, StorageError> {
        let mut sql = format!("SELECT {STOCK_COLUMNS} FROM stocks");
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", escape_like(search));
            clauses.push("(name LIKE ? ESCAPE '\\' OR ticker LIKE ? ESCAPE '\\')".into());
            values.push(pattern.clone());
            values.push(pattern);
        }
        if let Some(sector) = &filter.sector {
            clauses.push("sector = ?".into());
            values.push(sector.clone());
        }
        if let Some(ticker) = &filter.ticker {
            clauses.push("ticker = ?".into());
            values.push(ticker.trim().to_uppercase());
        }
        if let Some(has_thesis) = filter.has_thesis {
            let op = if has_thesis { "!=" } else { "=" };
            clauses.push(format!(
                "TRIM(COALESCE(json_extract(metadata, '$.investment_thesis'), '')) {op} ''"
            ));
        }
        if let Some(has_embedding) = filter.has_embedding {
            clauses.push(
                if has_embedding {
                    "embedding IS NOT NULL"
                } else {
                    "embedding IS NULL"
                }
                .into(),
            );
        }
        if let Some(conviction) = &filter.conviction {
            clauses.push("json_extract(thesis_analysis, '$.conviction_level') = ?".into());
            values.push(conviction.as_str().to_string());
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(&values), row_to_stock)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring match over name and ticker, in id order.
    pub fn keyword_search_stocks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Stock>, StorageError> {
        let pattern = format!("%{}%", escape_like(query));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks
             WHERE name LIKE ?1 ESCAPE '\\' OR ticker LIKE ?1 ESCAPE '\\'
             ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], row_to_stock)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every stock that currently has an embedding, in ascending id order.
    /// This is the semantic-search candidate set.
    pub fn stocks_with_embedding(&self) -> Result<Vec<Stock>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE embedding IS NOT NULL ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], row_to_stock)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fetch the listed stocks in ascending id order. Unknown ids are
    /// silently absent from the result.
    pub fn stocks_by_ids(&self, ids: &[i64]) -> Result<Vec<Stock>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE id IN ({placeholders}) ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids), row_to_stock)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Write the embedding column only; `updated_at` stays as it was.
    pub fn set_stock_embedding(&self, id: i64, embedding: &[f32]) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE stocks SET embedding = ?1 WHERE id = ?2",
            params![vector_to_blob(embedding), id],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound { kind: "stock", id });
        }
        Ok(())
    }

    /// Write the thesis-analysis column only; `updated_at` stays as it was.
    pub fn set_stock_thesis_analysis(
        &self,
        id: i64,
        analysis: &ThesisAnalysis,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(analysis)?;
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE stocks SET thesis_analysis = ?1 WHERE id = ?2",
            params![json, id],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound { kind: "stock", id });
        }
        Ok(())
    }

    /// Full-row write used by the update paths. Embedding and thesis
    /// analysis keep their own dedicated setters and are not written here.
    fn write_stock(&self, stock: &Stock) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let affected = conn
            .execute(
                "UPDATE stocks SET name = ?1, ticker = ?2, sector = ?3, description = ?4, \
                 notes = ?5, tags = ?6, price = ?7, market_cap = ?8, metadata = ?9, \
                 updated_at = ?10 WHERE id = ?11",
                params![
                    stock.name,
                    stock.ticker,
                    stock.sector,
                    stock.description,
                    stock.notes,
                    serde_json::to_string(&stock.tags)?,
                    stock.price,
                    stock.market_cap,
                    serde_json::to_string(&stock.metadata)?,
                    stock.updated_at.to_rfc3339(),
                    stock.id,
                ],
            )
            .map_err(|e| duplicate_ticker_err(e, &stock.ticker))?;
        if affected == 0 {
            return Err(StorageError::NotFound {
                kind: "stock",
                id: stock.id,
            });
        }
        Ok(())
    }
}
