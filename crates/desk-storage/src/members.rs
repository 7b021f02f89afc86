//! Member persistence: CRUD, filtered listing and stock-link sync.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::Deserialize;

use desk_types::{LinkedStock, Member, MemberUpdate, NewMember, StockLink};

use crate::db::{
    datetime_column, embedding_column, escape_like, json_column, opt_date_column, vector_to_blob,
    Database, DATE_FORMAT,
};
use crate::error::StorageError;

/// Column list shared by every member SELECT.
const MEMBER_COLUMNS: &str = "id, name, company, job_title, bio, investor_type, tags, \
     investment_focus, location, last_contact_date, is_active, notes, embedding, \
     created_at, updated_at";

const ORIGINATED_TABLE: &str = "member_originated_stocks";
const COMMENTED_TABLE: &str = "member_commented_stocks";

/// Filters accepted by the member listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    /// Substring match over name, company, job title and bio
    pub search: Option<String>,
    pub investor_type: Option<String>,
    pub is_active: Option<bool>,
    pub has_embedding: Option<bool>,
}

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get("id")?,
        name: row.get("name")?,
        company: row.get("company")?,
        job_title: row.get("job_title")?,
        bio: row.get("bio")?,
        investor_type: row.get("investor_type")?,
        tags: json_column(row, "tags")?,
        investment_focus: json_column(row, "investment_focus")?,
        location: row.get("location")?,
        last_contact_date: opt_date_column(row, "last_contact_date")?,
        is_active: row.get("is_active")?,
        notes: row.get("notes")?,
        embedding: embedding_column(row, "embedding")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Map FK/PK violations in link inserts to an input error the API can 422.
fn bad_link_err(err: rusqlite::Error, stock_id: i64) -> StorageError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            return StorageError::InvalidInput(format!(
                "stock {stock_id} cannot be linked (missing or listed twice)"
            ));
        }
    }
    StorageError::Sqlite(err)
}

impl Database {
    /// Insert a member and return the stored row.
    pub fn insert_member(&self, new: &NewMember) -> Result<Member, StorageError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidInput(
                "member name must not be empty".into(),
            ));
        }

        let now = Utc::now();
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO members (name, company, job_title, bio, investor_type, tags, \
                 investment_focus, location, last_contact_date, is_active, notes, \
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    name,
                    new.company,
                    new.job_title,
                    new.bio,
                    new.investor_type,
                    serde_json::to_string(&new.tags)?,
                    serde_json::to_string(&new.investment_focus)?,
                    new.location,
                    new.last_contact_date
                        .map(|d| d.format(DATE_FORMAT).to_string()),
                    new.is_active,
                    new.notes,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.require_member(id)
    }

    pub fn get_member(&self, id: i64) -> Result<Option<Member>, StorageError> {
        let conn = self.conn()?;
        let member = conn
            .query_row(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?1"),
                params![id],
                row_to_member,
            )
            .optional()?;
        Ok(member)
    }

    pub fn require_member(&self, id: i64) -> Result<Member, StorageError> {
        self.get_member(id)?
            .ok_or(StorageError::NotFound { kind: "member", id })
    }

    /// Apply a partial update and return the new row. The embedding column
    /// is never written here.
    pub fn update_member(&self, id: i64, update: &MemberUpdate) -> Result<Member, StorageError> {
        let mut member = self.require_member(id)?;

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StorageError::InvalidInput(
                    "member name must not be empty".into(),
                ));
            }
            member.name = name.to_string();
        }
        if let Some(company) = &update.company {
            member.company = Some(company.clone());
        }
        if let Some(job_title) = &update.job_title {
            member.job_title = Some(job_title.clone());
        }
        if let Some(bio) = &update.bio {
            member.bio = Some(bio.clone());
        }
        if let Some(investor_type) = &update.investor_type {
            member.investor_type = Some(investor_type.clone());
        }
        if let Some(tags) = &update.tags {
            member.tags = tags.clone();
        }
        if let Some(focus) = &update.investment_focus {
            member.investment_focus = focus.clone();
        }
        if let Some(location) = &update.location {
            member.location = Some(location.clone());
        }
        if let Some(date) = update.last_contact_date {
            member.last_contact_date = Some(date);
        }
        if let Some(is_active) = update.is_active {
            member.is_active = is_active;
        }
        if let Some(notes) = &update.notes {
            member.notes = Some(notes.clone());
        }

        member.updated_at = Utc::now();

        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE members SET name = ?1, company = ?2, job_title = ?3, bio = ?4, \
             investor_type = ?5, tags = ?6, investment_focus = ?7, location = ?8, \
             last_contact_date = ?9, is_active = ?10, notes = ?11, updated_at = ?12 \
             WHERE id = ?13",
            params![
                member.name,
                member.company,
                member.job_title,
                member.bio,
                member.investor_type,
                serde_json::to_string(&member.tags)?,
                serde_json::to_string(&member.investment_focus)?,
                member.location,
                member
                    .last_contact_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                member.is_active,
                member.notes,
                member.updated_at.to_rfc3339(),
                member.id,
            ],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound { kind: "member", id });
        }
        Ok(member)
    }

    pub fn delete_member(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM members WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Filtered listing in ascending id order.
    pub fn list_members(&self, filter: &MemberFilter) -> Result<Vec<Member>, StorageError> {
        let mut sql = format!("SELECT {MEMBER_COLUMNS} FROM members");
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", escape_like(search));
            clauses.push(
                "(name LIKE ? ESCAPE '\\' OR company LIKE ? ESCAPE '\\' \
                 OR job_title LIKE ? ESCAPE '\\' OR bio LIKE ? ESCAPE '\\')"
                    .into(),
            );
            for _ in 0..4 {
                values.push(pattern.clone());
            }
        }
        if let Some(investor_type) = &filter.investor_type {
            clauses.push("investor_type = ?".into());
            values.push(investor_type.clone());
        }
        if let Some(is_active) = filter.is_active {
            clauses.push(format!("is_active = {}", i64::from(is_active)));
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

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(&values), row_to_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring match over name, company, job title and
    /// bio, in id order.
    pub fn keyword_search_members(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Member>, StorageError> {
        let pattern = format!("%{}%", escape_like(query));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members
             WHERE name LIKE ?1 ESCAPE '\\' OR company LIKE ?1 ESCAPE '\\'
                OR job_title LIKE ?1 ESCAPE '\\' OR bio LIKE ?1 ESCAPE '\\'
             ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], row_to_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every member that currently has an embedding, in ascending id order.
    /// This is the semantic-search candidate set.
    pub fn members_with_embedding(&self) -> Result<Vec<Member>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE embedding IS NOT NULL ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], row_to_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Fetch the listed members in ascending id order. Unknown ids are
    /// silently absent from the result.
    pub fn members_by_ids(&self, ids: &[i64]) -> Result<Vec<Member>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id IN ({placeholders}) ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(ids), row_to_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Write the embedding column only; `updated_at` stays as it was.
    pub fn set_member_embedding(&self, id: i64, embedding: &[f32]) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE members SET embedding = ?1 WHERE id = ?2",
            params![vector_to_blob(embedding), id],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound { kind: "member", id });
        }
        Ok(())
    }

    /// Replace the member's originated-stock list wholesale.
    pub fn set_originated_stocks(
        &self,
        member_id: i64,
        links: &[StockLink],
    ) -> Result<(), StorageError> {
        self.replace_links(ORIGINATED_TABLE, member_id, links)
    }

    /// Replace the member's commented-stock list wholesale.
    pub fn set_commented_stocks(
        &self,
        member_id: i64,
        links: &[StockLink],
    ) -> Result<(), StorageError> {
        self.replace_links(COMMENTED_TABLE, member_id, links)
    }

    fn replace_links(
        &self,
        table: &str,
        member_id: i64,
        links: &[StockLink],
    ) -> Result<(), StorageError> {
        self.require_member(member_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {table} WHERE member_id = ?1"),
            params![member_id],
        )?;
        let now = Utc::now().to_rfc3339();
        for link in links {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (member_id, stock_id, note, created_at) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![member_id, link.stock_id, link.note, now],
            )
            .map_err(|e| bad_link_err(e, link.stock_id))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Stocks this member originated, joined with their current name and
    /// ticker, in ascending stock-id order.
    pub fn originated_stocks_of(&self, member_id: i64) -> Result<Vec<LinkedStock>, StorageError> {
        self.linked_stocks(ORIGINATED_TABLE, member_id)
    }

    /// Stocks this member commented on, in ascending stock-id order.
    pub fn commented_stocks_of(&self, member_id: i64) -> Result<Vec<LinkedStock>, StorageError> {
        self.linked_stocks(COMMENTED_TABLE, member_id)
    }

    fn linked_stocks(&self, table: &str, member_id: i64) -> Result<Vec<LinkedStock>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT s.id, s.name, s.ticker, l.note
             FROM {table} l JOIN stocks s ON s.id = l.stock_id
             WHERE l.member_id = ?1 ORDER BY s.id"
        ))?;
        let rows = stmt
            .query_map(params![member_id], |row| {
                Ok(LinkedStock {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ticker: row.get(2)?,
                    note: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use desk_types::NewStock;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    fn new_member(name: &str) -> NewMember {
        NewMember {
            name: name.to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    fn seed_stock(db: &Database, name: &str, ticker: &str) -> i64 {
        db.insert_stock(&NewStock {
            name: name.to_string(),
            ticker: ticker.to_string(),
            ..Default::default()
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let db = test_db();
        let member = db
            .insert_member(&NewMember {
                company: Some("Acme Capital".into()),
                tags: vec!["fintech".into()],
                investment_focus: vec!["seed".into(), "series-a".into()],
                last_contact_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                ..new_member("  Dana Reyes ")
            })
            .unwrap();

        assert_eq!(member.name, "Dana Reyes");
        assert!(member.is_active);

        let fetched = db.get_member(member.id).unwrap().unwrap();
        assert_eq!(fetched, member);
        assert_eq!(
            fetched.last_contact_date,
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
    }

    #[test]
    fn test_insert_rejects_blank_name() {
        let db = test_db();
        assert!(matches!(
            db.insert_member(&new_member("   ")),
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_update_member_fields() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();

        let updated = db
            .update_member(
                member.id,
                &MemberUpdate {
                    job_title: Some("Partner".into()),
                    is_active: Some(false),
                    tags: Some(vec!["climate".into()]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.job_title.as_deref(), Some("Partner"));
        assert!(!updated.is_active);
        assert_eq!(updated.tags, vec!["climate".to_string()]);
        // Untouched fields survive
        assert_eq!(updated.name, "Dana Reyes");
    }

    #[test]
    fn test_update_leaves_embedding_in_place() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        db.set_member_embedding(member.id, &[0.2, 0.8]).unwrap();

        db.update_member(
            member.id,
            &MemberUpdate {
                bio: Some("Backs infra founders".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let fetched = db.get_member(member.id).unwrap().unwrap();
        assert_eq!(fetched.embedding, Some(vec![0.2, 0.8]));
    }

    #[test]
    fn test_set_embedding_does_not_touch_updated_at() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        db.set_member_embedding(member.id, &[1.0, 0.0]).unwrap();

        let fetched = db.get_member(member.id).unwrap().unwrap();
        assert_eq!(fetched.updated_at, member.updated_at);
    }

    #[test]
    fn test_keyword_search_covers_bio_and_title() {
        let db = test_db();
        let a = db
            .insert_member(&NewMember {
                bio: Some("Early energy storage investor".into()),
                ..new_member("Dana Reyes")
            })
            .unwrap();
        let b = db
            .insert_member(&NewMember {
                job_title: Some("Energy Analyst".into()),
                ..new_member("Sam Okafor")
            })
            .unwrap();
        db.insert_member(&new_member("Priya Shah")).unwrap();

        let hits = db.keyword_search_members("ENERGY", 20).unwrap();
        assert_eq!(
            hits.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[test]
    fn test_list_filters() {
        let db = test_db();
        let a = db
            .insert_member(&NewMember {
                investor_type: Some("vc".into()),
                ..new_member("Dana Reyes")
            })
            .unwrap();
        let b = db
            .insert_member(&NewMember {
                investor_type: Some("angel".into()),
                is_active: false,
                ..new_member("Sam Okafor")
            })
            .unwrap();
        db.set_member_embedding(a.id, &[0.5]).unwrap();

        let vcs = db
            .list_members(&MemberFilter {
                investor_type: Some("vc".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(vcs.len(), 1);
        assert_eq!(vcs[0].id, a.id);

        let inactive = db
            .list_members(&MemberFilter {
                is_active: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].id, b.id);

        let missing = db
            .list_members(&MemberFilter {
                has_embedding: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, b.id);
    }

    #[test]
    fn test_link_sync_replaces_wholesale() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let s1 = seed_stock(&db, "Energy Corp", "ENRG");
        let s2 = seed_stock(&db, "Chipworks", "CHIP");

        db.set_originated_stocks(
            member.id,
            &[
                StockLink {
                    stock_id: s1,
                    note: Some("pitched at offsite".into()),
                },
                StockLink {
                    stock_id: s2,
                    note: None,
                },
            ],
        )
        .unwrap();
        assert_eq!(db.originated_stocks_of(member.id).unwrap().len(), 2);

        // Second sync drops s1
        db.set_originated_stocks(
            member.id,
            &[StockLink {
                stock_id: s2,
                note: Some("follow-up".into()),
            }],
        )
        .unwrap();
        let links = db.originated_stocks_of(member.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].id, s2);
        assert_eq!(links[0].ticker, "CHIP");
        assert_eq!(links[0].note.as_deref(), Some("follow-up"));
    }

    #[test]
    fn test_link_to_missing_stock_is_invalid_input() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let err = db
            .set_commented_stocks(
                member.id,
                &[StockLink {
                    stock_id: 999,
                    note: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)), "{err}");
        assert!(db.commented_stocks_of(member.id).unwrap().is_empty());
    }

    #[test]
    fn test_link_sync_unknown_member_is_not_found() {
        let db = test_db();
        assert!(db
            .set_originated_stocks(42, &[])
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_both_link_tables_are_independent() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let s1 = seed_stock(&db, "Energy Corp", "ENRG");
        let s2 = seed_stock(&db, "Chipworks", "CHIP");

        db.set_originated_stocks(
            member.id,
            &[
                StockLink {
                    stock_id: s1,
                    note: None,
                },
                StockLink {
                    stock_id: s2,
                    note: None,
                },
            ],
        )
        .unwrap();
        db.set_commented_stocks(
            member.id,
            &[StockLink {
                stock_id: s1,
                note: None,
            }],
        )
        .unwrap();

        let originated = db.originated_stocks_of(member.id).unwrap();
        let commented = db.commented_stocks_of(member.id).unwrap();
        assert_eq!(originated.len(), 2);
        assert_eq!(commented.len(), 1);
        assert_eq!(commented[0].ticker, "ENRG");
    }

    #[test]
    fn test_deleting_member_cascades_links() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let s1 = seed_stock(&db, "Energy Corp", "ENRG");
        db.set_originated_stocks(
            member.id,
            &[StockLink {
                stock_id: s1,
                note: None,
            }],
        )
        .unwrap();

        assert!(db.delete_member(member.id).unwrap());
        // The stock itself survives
        assert!(db.get_stock(s1).unwrap().is_some());
    }

    #[test]
    fn test_deleting_stock_cascades_out_of_links() {
        let db = test_db();
        let member = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let s1 = seed_stock(&db, "Energy Corp", "ENRG");
        db.set_commented_stocks(
            member.id,
            &[StockLink {
                stock_id: s1,
                note: None,
            }],
        )
        .unwrap();

        db.delete_stock(s1).unwrap();
        assert!(db.commented_stocks_of(member.id).unwrap().is_empty());
    }

    #[test]
    fn test_members_by_ids_and_embedding_scan() {
        let db = test_db();
        let a = db.insert_member(&new_member("Dana Reyes")).unwrap();
        let b = db.insert_member(&new_member("Sam Okafor")).unwrap();
        db.set_member_embedding(a.id, &[0.1]).unwrap();

        let with = db.members_with_embedding().unwrap();
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].id, a.id);

        let both = db.members_by_ids(&[b.id, a.id]).unwrap();
        assert_eq!(both.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }
}
