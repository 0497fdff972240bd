//! Cursor pagination for `*/list` results
//!
//! Cursors are opaque to peers. Internally one encodes the offset of the next
//! page, the list it was cut from, a fingerprint of that list's item keys and
//! a salt unique to the issuing paginator. A cursor from another list, another
//! session or a list whose membership has since changed is rejected instead
//! of silently returning the wrong page.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use tandem_mcp_protocol::{Cursor, McpError, McpResult, PaginatedResult};

use crate::config::PaginationConfig;

const CURSOR_VERSION: u8 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CursorState {
    v: u8,
    o: usize,
    s: String,
    l: String,
    f: u64,
}

/// One page of a list
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn into_result<R>(self) -> R
    where
        R: PaginatedResult<Item = T>,
    {
        R::from_page(self.items, self.next_cursor)
    }
}

#[derive(Debug, Clone)]
pub struct Paginator {
    salt: String,
    page_size: usize,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            salt: Uuid::new_v4().simple().to_string(),
            page_size: config.page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Slice `items` at `cursor`; `None` means the first page.
    ///
    /// `list` names the listing (usually its method) and `key` identifies each
    /// item within it. Cursors only resolve against the same list with the
    /// same keys in the same order.
    pub fn paginate<T>(
        &self,
        list: &str,
        mut items: Vec<T>,
        key: impl Fn(&T) -> &str,
        cursor: Option<&Cursor>,
    ) -> McpResult<Page<T>> {
        let total = items.len();
        let fingerprint = fingerprint(list, items.iter().map(&key));
        let offset = match cursor {
            Some(cursor) => self.decode(cursor, list, fingerprint, total)?,
            None => 0,
        };
        let end = offset.saturating_add(self.page_size).min(total);
        let next_cursor = (end < total).then(|| self.encode(end, list, fingerprint));
        let page: Vec<T> = items.drain(offset..end).collect();
        Ok(Page {
            items: page,
            next_cursor,
        })
    }

    fn encode(&self, offset: usize, list: &str, fingerprint: u64) -> Cursor {
        let state = CursorState {
            v: CURSOR_VERSION,
            o: offset,
            s: self.salt.clone(),
            l: list.to_string(),
            f: fingerprint,
        };
        // Serializing a struct of plain fields cannot fail
        let bytes = serde_json::to_vec(&state).unwrap_or_default();
        Cursor(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(
        &self,
        cursor: &Cursor,
        list: &str,
        fingerprint: u64,
        total: usize,
    ) -> McpResult<usize> {
        let invalid = |why: &str| McpError::InvalidCursor(why.to_string());
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.as_str())
            .map_err(|_| invalid("not a cursor issued by this server"))?;
        let state: CursorState = serde_json::from_slice(&bytes)
            .map_err(|_| invalid("not a cursor issued by this server"))?;
        if state.v != CURSOR_VERSION || state.s != self.salt {
            return Err(invalid("cursor was issued by another session"));
        }
        if state.l != list {
            return Err(invalid("cursor belongs to another list"));
        }
        if state.f != fingerprint {
            return Err(invalid("the list changed since the cursor was issued"));
        }
        if state.o == 0 || state.o >= total {
            return Err(invalid("cursor is out of range"));
        }
        Ok(state.o)
    }
}

fn fingerprint<'a>(list: &str, keys: impl Iterator<Item = &'a str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    list.hash(&mut hasher);
    for key in keys {
        key.hash(&mut hasher);
    }
    hasher.finish()
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}
