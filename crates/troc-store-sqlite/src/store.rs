//! [`SqliteStore`] — the SQLite implementation of [`BarterStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use troc_core::{
  attitude::{AttitudeFact, AttitudeKind},
  matching::{Match, MatchView, Message, canonical_pair},
  product::{NewProduct, Product, ProductUpdate},
  store::{
    AttitudeWrite, BarterStore, ForeignInterest, InterestedPeer, SyncDelta,
    UpdatedForeignProduct,
  },
  user::{User, UserProfile, default_wishlist},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    encode_attitude_kind, encode_dt, encode_uuid, encode_wishlist,
    row_to_match, row_to_message, row_to_product, row_to_user,
  },
  schema::SCHEMA,
};

const PRODUCT_COLS: &str =
  "product_id, owner_id, category, title, description, requires_return, \
   updated_at";
const MESSAGE_COLS: &str = "message_id, match_id, sender_id, content, sent_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Troc barter store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── In-transaction helpers ──────────────────────────────────────────────────

fn select_product(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Option<Product>> {
  conn
    .query_row(
      &format!("SELECT {PRODUCT_COLS} FROM products WHERE product_id = ?1"),
      rusqlite::params![id_str],
      row_to_product,
    )
    .optional()
}

fn select_match_by_pair(
  conn: &rusqlite::Connection,
  lo: &str,
  hi: &str,
) -> rusqlite::Result<Option<Match>> {
  conn
    .query_row(
      "SELECT match_id, user_lo, user_hi, created_at
       FROM matches WHERE user_lo = ?1 AND user_hi = ?2",
      rusqlite::params![lo, hi],
      row_to_match,
    )
    .optional()
}

fn select_messages(
  conn: &rusqlite::Connection,
  match_id_str: &str,
  window: Option<(&str, &str)>,
) -> rusqlite::Result<Vec<Message>> {
  match window {
    None => {
      let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLS} FROM messages
         WHERE match_id = ?1 ORDER BY sent_at ASC"
      ))?;
      let rows = stmt.query_map(rusqlite::params![match_id_str], row_to_message)?;
      rows.collect()
    }
    Some((after, until)) => {
      let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLS} FROM messages
         WHERE match_id = ?1 AND sent_at > ?2 AND sent_at <= ?3
         ORDER BY sent_at ASC"
      ))?;
      let rows = stmt
        .query_map(rusqlite::params![match_id_str, after, until], row_to_message)?;
      rows.collect()
    }
  }
}

/// Materialise one participant's view of `m`, including full message
/// history. Returns `None` when `user_id` is not a participant.
fn build_match_view(
  conn: &rusqlite::Connection,
  m: &Match,
  user_id: &str,
) -> rusqlite::Result<Option<MatchView>> {
  let Some(counterpart) = m.counterpart(user_id) else {
    return Ok(None);
  };

  let (counterpart_name, counterpart_picture_url): (String, Option<String>) =
    conn.query_row(
      "SELECT name, picture_url FROM users WHERE user_id = ?1",
      rusqlite::params![counterpart],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

  // This side's products the counterpart wants — ids only.
  let mut stmt = conn.prepare(
    "SELECT a.product_id FROM attitudes a
     JOIN products p ON p.product_id = a.product_id
     WHERE a.user_id = ?1 AND a.kind = 'interested' AND p.owner_id = ?2
     ORDER BY a.product_id",
  )?;
  let own_product_ids = stmt
    .query_map(rusqlite::params![counterpart, user_id], |row| {
      let s: String = row.get(0)?;
      crate::encode::decode_uuid_col(0, &s)
    })?
    .collect::<rusqlite::Result<Vec<Uuid>>>()?;

  // The counterpart's products this side wants — full records.
  let mut stmt = conn.prepare(&format!(
    "SELECT {PRODUCT_COLS} FROM products
     WHERE owner_id = ?1 AND product_id IN
       (SELECT product_id FROM attitudes
        WHERE user_id = ?2 AND kind = 'interested')
     ORDER BY product_id"
  ))?;
  let foreign_products = stmt
    .query_map(rusqlite::params![counterpart, user_id], row_to_product)?
    .collect::<rusqlite::Result<Vec<Product>>>()?;

  let messages = select_messages(conn, &encode_uuid(m.id), None)?
    .iter()
    .map(|msg| msg.view_for(user_id))
    .collect();

  Ok(Some(MatchView {
    match_id: m.id,
    created_at: m.created_at,
    counterpart_name,
    counterpart_picture_url,
    own_product_ids,
    foreign_products,
    messages,
  }))
}

fn select_matches_for_user(
  conn: &rusqlite::Connection,
  user_id: &str,
) -> rusqlite::Result<Vec<Match>> {
  let mut stmt = conn.prepare(
    "SELECT match_id, user_lo, user_hi, created_at FROM matches
     WHERE user_lo = ?1 OR user_hi = ?1
     ORDER BY created_at",
  )?;
  let rows = stmt.query_map(rusqlite::params![user_id], row_to_match)?;
  rows.collect()
}

// ─── BarterStore impl ────────────────────────────────────────────────────────

impl BarterStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn login_user(&self, profile: UserProfile) -> Result<(User, bool)> {
    let wishlist_str = encode_wishlist(&default_wishlist())?;

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing = tx
          .query_row(
            "SELECT user_id, name, picture_url, wishlist
             FROM users WHERE user_id = ?1",
            rusqlite::params![profile.id],
            row_to_user,
          )
          .optional()?;

        let result = match existing {
          None => {
            tx.execute(
              "INSERT INTO users (user_id, name, picture_url, wishlist)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![
                profile.id,
                profile.name,
                profile.picture_url,
                wishlist_str,
              ],
            )?;
            let user = User {
              id:          profile.id,
              name:        profile.name,
              picture_url: profile.picture_url,
              wishlist:    default_wishlist(),
            };
            (user, true)
          }
          Some(mut user) => {
            // Picture supplied for the first time — fill it in.
            if user.picture_url.is_none() && profile.picture_url.is_some() {
              tx.execute(
                "UPDATE users SET picture_url = ?2 WHERE user_id = ?1",
                rusqlite::params![user.id, profile.picture_url],
              )?;
              user.picture_url = profile.picture_url;
            }
            (user, false)
          }
        };

        tx.commit()?;
        Ok(result)
      })
      .await?;
    Ok(result)
  }

  async fn get_user(&self, id: &str) -> Result<Option<User>> {
    let id = id.to_owned();
    let user = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, name, picture_url, wishlist
               FROM users WHERE user_id = ?1",
              rusqlite::params![id],
              row_to_user,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(user)
  }

  async fn set_wishlist(
    &self,
    user_id: &str,
    wishlist: Vec<u8>,
  ) -> Result<Option<User>> {
    let user_id = user_id.to_owned();
    let wishlist_str = encode_wishlist(&wishlist)?;

    let user = self
      .conn
      .call(move |conn| {
        let affected = conn.execute(
          "UPDATE users SET wishlist = ?2 WHERE user_id = ?1",
          rusqlite::params![user_id, wishlist_str],
        )?;
        if affected == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              "SELECT user_id, name, picture_url, wishlist
               FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              row_to_user,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(user)
  }

  // ── Products ──────────────────────────────────────────────────────────────

  async fn insert_product(&self, input: NewProduct) -> Result<Product> {
    let product = Product {
      id:              Uuid::new_v4(),
      owner_id:        input.owner_id,
      category:        input.category,
      title:           input.title,
      description:     input.description,
      requires_return: input.requires_return,
      updated_at:      Utc::now(),
    };

    let row = product.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          &format!(
            "INSERT INTO products ({PRODUCT_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          ),
          rusqlite::params![
            encode_uuid(row.id),
            row.owner_id,
            row.category,
            row.title,
            row.description,
            row.requires_return,
            encode_dt(row.updated_at),
          ],
        )?;
        // The owner never swipes their own product: suppress it outright.
        tx.execute(
          "INSERT INTO attitudes (user_id, product_id, kind, recorded_at)
           VALUES (?1, ?2, 'dismiss', ?3)",
          rusqlite::params![
            row.owner_id,
            encode_uuid(row.id),
            encode_dt(row.updated_at),
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(product)
  }

  async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
    let id_str = encode_uuid(id);
    let product = self
      .conn
      .call(move |conn| Ok(select_product(conn, &id_str)?))
      .await?;
    Ok(product)
  }

  async fn products_owned_by(&self, user_id: &str) -> Result<Vec<Product>> {
    let user_id = user_id.to_owned();
    let products = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PRODUCT_COLS} FROM products
           WHERE owner_id = ?1 ORDER BY product_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], row_to_product)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(products)
  }

  async fn update_product(
    &self,
    update: ProductUpdate,
  ) -> Result<Option<Product>> {
    let updated_at = Utc::now();

    let product = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let affected = tx.execute(
          "UPDATE products
           SET category = ?2, title = ?3, description = ?4,
               requires_return = ?5, updated_at = ?6
           WHERE product_id = ?1",
          rusqlite::params![
            encode_uuid(update.id),
            update.category,
            update.title,
            update.description,
            update.requires_return,
            encode_dt(updated_at),
          ],
        )?;
        if affected == 0 {
          return Ok(None);
        }
        let product = select_product(&tx, &encode_uuid(update.id))?;
        tx.commit()?;
        Ok(product)
      })
      .await?;
    Ok(product)
  }

  async fn delete_product(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        let affected = conn.execute(
          "DELETE FROM products WHERE product_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(affected > 0)
      })
      .await?;
    Ok(deleted)
  }

  async fn interested_match_peers(
    &self,
    product_id: Uuid,
    owner_id: &str,
  ) -> Result<Vec<InterestedPeer>> {
    let product_str = encode_uuid(product_id);
    let owner_id = owner_id.to_owned();

    let peers = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.match_id,
                  CASE WHEN m.user_lo = ?2 THEN m.user_hi ELSE m.user_lo END
           FROM matches m
           WHERE (m.user_lo = ?2 OR m.user_hi = ?2)
             AND EXISTS (
               SELECT 1 FROM attitudes a
               WHERE a.product_id = ?1
                 AND a.kind = 'interested'
                 AND a.user_id =
                   CASE WHEN m.user_lo = ?2 THEN m.user_hi ELSE m.user_lo END
             )",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![product_str, owner_id], |row| {
            let match_str: String = row.get(0)?;
            Ok(InterestedPeer {
              match_id: crate::encode::decode_uuid_col(0, &match_str)?,
              user_id:  row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(peers)
  }

  // ── Attitudes ─────────────────────────────────────────────────────────────

  async fn record_attitude(
    &self,
    user_id: &str,
    product_id: Uuid,
    kind: AttitudeKind,
  ) -> Result<AttitudeWrite> {
    let user_id = user_id.to_owned();
    let product_str = encode_uuid(product_id);
    let recorded_at = Utc::now();

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut new_facts = Vec::new();
        let mut first_interest = false;
        for implied in kind.implies() {
          let inserted = tx.execute(
            "INSERT INTO attitudes (user_id, product_id, kind, recorded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, product_id, kind) DO NOTHING",
            rusqlite::params![
              user_id,
              product_str,
              encode_attitude_kind(*implied),
              encode_dt(recorded_at),
            ],
          )?;
          if inserted > 0 {
            if *implied == AttitudeKind::Interested {
              first_interest = true;
            }
            new_facts.push(AttitudeFact {
              user_id: user_id.clone(),
              product_id,
              kind: *implied,
              recorded_at,
            });
          }
        }

        // Same transaction: the product either exists for the whole write
        // or is gone for the whole write.
        let product = select_product(&tx, &product_str)?;

        tx.commit()?;
        Ok(AttitudeWrite { new_facts, product, first_interest })
      })
      .await?;
    Ok(write)
  }

  async fn mutual_interest_exists(
    &self,
    owner_id: &str,
    swiper_id: &str,
  ) -> Result<bool> {
    let owner_id = owner_id.to_owned();
    let swiper_id = swiper_id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        let found: Option<i64> = conn
          .query_row(
            "SELECT 1 FROM attitudes a
             JOIN products p ON p.product_id = a.product_id
             WHERE a.user_id = ?1 AND a.kind = 'interested'
               AND p.owner_id = ?2
             LIMIT 1",
            rusqlite::params![owner_id, swiper_id],
            |row| row.get(0),
          )
          .optional()?;
        Ok(found.is_some())
      })
      .await?;
    Ok(exists)
  }

  // ── Matches ───────────────────────────────────────────────────────────────

  async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>> {
    let match_str = encode_uuid(match_id);
    let m = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT match_id, user_lo, user_hi, created_at
               FROM matches WHERE match_id = ?1",
              rusqlite::params![match_str],
              row_to_match,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(m)
  }

  async fn find_match(&self, a: &str, b: &str) -> Result<Option<Match>> {
    let (lo, hi) = canonical_pair(a, b);
    let lo = lo.to_owned();
    let hi = hi.to_owned();

    let m = self
      .conn
      .call(move |conn| Ok(select_match_by_pair(conn, &lo, &hi)?))
      .await?;
    Ok(m)
  }

  async fn create_or_get_match(
    &self,
    a: &str,
    b: &str,
  ) -> Result<(Match, bool)> {
    let (lo, hi) = canonical_pair(a, b);
    let lo = lo.to_owned();
    let hi = hi.to_owned();
    let candidate_id = Uuid::new_v4();
    let created_at = Utc::now();

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Atomic check-then-insert: the UNIQUE (user_lo, user_hi)
        // constraint absorbs the duplicate, and the loser of a race
        // re-reads the winner's row instead of erroring.
        let inserted = tx.execute(
          "INSERT INTO matches (match_id, user_lo, user_hi, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_lo, user_hi) DO NOTHING",
          rusqlite::params![
            encode_uuid(candidate_id),
            lo,
            hi,
            encode_dt(created_at),
          ],
        )?;

        let m = select_match_by_pair(&tx, &lo, &hi)?.ok_or_else(|| {
          rusqlite::Error::QueryReturnedNoRows
        })?;

        tx.commit()?;
        Ok((m, inserted > 0))
      })
      .await?;
    Ok(result)
  }

  async fn matches_for_user(&self, user_id: &str) -> Result<Vec<Match>> {
    let user_id = user_id.to_owned();
    let matches = self
      .conn
      .call(move |conn| Ok(select_matches_for_user(conn, &user_id)?))
      .await?;
    Ok(matches)
  }

  async fn match_view(
    &self,
    match_id: Uuid,
    user_id: &str,
  ) -> Result<Option<MatchView>> {
    let match_str = encode_uuid(match_id);
    let user_id = user_id.to_owned();

    let view = self
      .conn
      .call(move |conn| {
        let m = conn
          .query_row(
            "SELECT match_id, user_lo, user_hi, created_at
             FROM matches WHERE match_id = ?1",
            rusqlite::params![match_str],
            row_to_match,
          )
          .optional()?;
        match m {
          None => Ok(None),
          Some(m) => Ok(build_match_view(conn, &m, &user_id)?),
        }
      })
      .await?;
    Ok(view)
  }

  // ── Candidates ────────────────────────────────────────────────────────────

  async fn candidate_batch(
    &self,
    user_id: &str,
    exclude: &[Uuid],
    limit: usize,
  ) -> Result<Vec<Product>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let user_id = user_id.to_owned();
    let exclude: Vec<String> = exclude.iter().copied().map(encode_uuid).collect();

    let products = self
      .conn
      .call(move |conn| {
        let wishlist_str: Option<String> = conn
          .query_row(
            "SELECT wishlist FROM users WHERE user_id = ?1",
            rusqlite::params![user_id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(wishlist_str) = wishlist_str else {
          return Ok(Vec::new());
        };
        let wishlist =
          crate::encode::decode_wishlist_col(0, &wishlist_str)?;
        if wishlist.is_empty() {
          return Ok(Vec::new());
        }

        let categories = wishlist
          .iter()
          .map(u8::to_string)
          .collect::<Vec<_>>()
          .join(", ");
        // Exclusion ids are hyphenated UUIDs we formatted ourselves, so
        // quoting them inline is safe.
        let exclude_clause = if exclude.is_empty() {
          String::new()
        } else {
          let ids = exclude
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");
          format!("AND p.product_id NOT IN ({ids})")
        };

        let sql = format!(
          "SELECT {PRODUCT_COLS} FROM products p
           WHERE p.owner_id != ?1
             AND p.category IN ({categories})
             AND NOT EXISTS (
               SELECT 1 FROM attitudes a
               WHERE a.user_id = ?1 AND a.product_id = p.product_id
             )
             {exclude_clause}
           ORDER BY p.product_id
           LIMIT ?2"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![user_id, limit as i64],
            row_to_product,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(products)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn insert_message(
    &self,
    match_id: Uuid,
    sender_id: &str,
    content: &str,
  ) -> Result<Option<Message>> {
    let message = Message {
      id:        Uuid::new_v4(),
      match_id,
      sender_id: sender_id.to_owned(),
      content:   content.to_owned(),
      sent_at:   Utc::now(),
    };

    let row = message.clone();
    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let match_exists: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM matches WHERE match_id = ?1",
            rusqlite::params![encode_uuid(row.match_id)],
            |r| r.get(0),
          )
          .optional()?;
        if match_exists.is_none() {
          return Ok(false);
        }

        tx.execute(
          &format!(
            "INSERT INTO messages ({MESSAGE_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5)"
          ),
          rusqlite::params![
            encode_uuid(row.id),
            encode_uuid(row.match_id),
            row.sender_id,
            row.content,
            encode_dt(row.sent_at),
          ],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(stored.then_some(message))
  }

  // ── Delta-sync ────────────────────────────────────────────────────────────

  async fn delta_since(
    &self,
    user_id: &str,
    since: DateTime<Utc>,
  ) -> Result<SyncDelta> {
    let user_id = user_id.to_owned();
    // Snapshot the upper bound before reading anything: every query below
    // is bounded to (since, as_of], so a repeat call with the same
    // watermark returns the same payload and nothing written after the
    // snapshot is half-reported.
    let as_of = Utc::now();
    let since_str = encode_dt(since);
    let as_of_str = encode_dt(as_of);

    let delta = self
      .conn
      .call(move |conn| {
        let mut new_matches = Vec::new();
        let mut product_updates = Vec::new();
        let mut new_interests = Vec::new();
        let mut messages = Vec::new();

        for m in select_matches_for_user(conn, &user_id)? {
          if m.created_at > since && m.created_at <= as_of {
            // The whole match is news: full view with message history.
            if let Some(view) = build_match_view(conn, &m, &user_id)? {
              new_matches.push(view);
            }
            continue;
          }
          if m.created_at > as_of {
            continue;
          }

          let Some(counterpart) = m.counterpart(&user_id) else {
            continue;
          };
          let match_str = encode_uuid(m.id);

          // (a) counterpart products this user cares about, updated in
          // the window.
          let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLS} FROM products p
             WHERE p.owner_id = ?1
               AND p.updated_at > ?3 AND p.updated_at <= ?4
               AND EXISTS (
                 SELECT 1 FROM attitudes a
                 WHERE a.user_id = ?2 AND a.product_id = p.product_id
                   AND a.kind = 'interested'
               )
             ORDER BY p.product_id"
          ))?;
          let updated = stmt
            .query_map(
              rusqlite::params![counterpart, user_id, since_str, as_of_str],
              row_to_product,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          product_updates.extend(updated.into_iter().map(|product| {
            UpdatedForeignProduct { match_id: m.id, product }
          }));

          // (b) counterpart interest in this user's own products,
          // recorded in the window.
          let mut stmt = conn.prepare(
            "SELECT DISTINCT a.product_id FROM attitudes a
             JOIN products p ON p.product_id = a.product_id
             WHERE a.user_id = ?1
               AND p.owner_id = ?2
               AND a.kind IN ('interested', 'willing_to_pay')
               AND a.recorded_at > ?3 AND a.recorded_at <= ?4
             ORDER BY a.product_id",
          )?;
          let interests = stmt
            .query_map(
              rusqlite::params![counterpart, user_id, since_str, as_of_str],
              |row| {
                let s: String = row.get(0)?;
                crate::encode::decode_uuid_col(0, &s)
              },
            )?
            .collect::<rusqlite::Result<Vec<Uuid>>>()?;
          new_interests.extend(interests.into_iter().map(|product_id| {
            ForeignInterest { match_id: m.id, product_id }
          }));

          // (c) messages in the window, tagged with ownership.
          let windowed = select_messages(
            conn,
            &match_str,
            Some((&since_str, &as_of_str)),
          )?;
          messages
            .extend(windowed.iter().map(|msg| msg.view_for(&user_id)));
        }

        messages.sort_by_key(|msg| msg.sent_at);

        Ok(SyncDelta {
          new_matches,
          product_updates,
          new_interests,
          messages,
          as_of,
        })
      })
      .await?;
    Ok(delta)
  }
}
