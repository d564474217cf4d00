//! Directory listings reconstructed from a flat key namespace.
//!
//! The store only knows keys. Directories are inferred from the slash-separated
//! segments of those keys: every ancestor of a key becomes exactly one
//! synthesized directory entry.

use crate::client::{BucketClient, ListRequest, MAX_LIST_LIMIT};
use crate::keys::dirname;
use crate::traits::StorageResult;
use qiniu_fs_core::{ListingEntry, ObjectRecord};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(ObjectRecord),
    Dir(String),
}

impl Node {
    fn path(&self) -> &str {
        match self {
            Node::File(record) => &record.key,
            Node::Dir(path) => path,
        }
    }

    fn into_entry(self) -> ListingEntry {
        match self {
            Node::File(record) => ListingEntry::file(&record),
            Node::Dir(path) => ListingEntry::dir(&path),
        }
    }
}

/// Insert `path` and each of its ancestors.
fn insert_with_ancestors(dirs: &mut BTreeSet<String>, path: &str) {
    if path.is_empty() || dirs.contains(path) {
        return;
    }
    let mut level = String::with_capacity(path.len());
    for segment in path.split('/') {
        if !level.is_empty() {
            level.push('/');
        }
        level.push_str(segment);
        if !dirs.contains(&level) {
            dirs.insert(level.clone());
        }
    }
}

/// File nodes for every record plus one directory node per distinct ancestor.
///
/// Keys ending in `/` are folder markers: they yield a directory node for the
/// folder instead of a file node.
fn nodes_from_records(records: Vec<ObjectRecord>) -> Vec<Node> {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    let mut files = Vec::with_capacity(records.len());
    for record in records {
        if record.key.ends_with('/') {
            insert_with_ancestors(&mut dirs, record.key.trim_end_matches('/'));
        } else {
            insert_with_ancestors(&mut dirs, dirname(&record.key));
            files.push(record);
        }
    }

    files
        .into_iter()
        .map(Node::File)
        .chain(dirs.into_iter().map(Node::Dir))
        .collect()
}

fn in_scope(path: &str, prefix: &str, recursive: bool) -> bool {
    if recursive {
        prefix.is_empty()
            || (path.len() > prefix.len()
                && path.starts_with(prefix)
                && path.as_bytes()[prefix.len()] == b'/')
    } else {
        dirname(path) == prefix
    }
}

/// Shape a complete record set into the sorted listing of `prefix`.
///
/// `prefix` must be normalized. Non-recursive listings keep direct children
/// only; recursive listings keep every descendant.
pub fn build_listing(
    records: Vec<ObjectRecord>,
    prefix: &str,
    recursive: bool,
) -> Vec<ListingEntry> {
    let mut nodes: Vec<Node> = nodes_from_records(records)
        .into_iter()
        .filter(|node| in_scope(node.path(), prefix, recursive))
        .collect();
    nodes.sort_by(|a, b| a.path().cmp(b.path()));
    nodes.into_iter().map(Node::into_entry).collect()
}

/// Drop placeholder objects from a listing.
pub fn without_keep(entries: Vec<ListingEntry>, keep_name: &str) -> Vec<ListingEntry> {
    entries
        .into_iter()
        .filter(|entry| !(entry.is_file() && entry.basename == keep_name))
        .collect()
}

/// Page through every record whose key starts with `prefix`.
///
/// A failed page fails the whole call; partial results are never returned.
pub async fn fetch_all_records(
    client: &dyn BucketClient,
    bucket: &str,
    prefix: &str,
) -> StorageResult<Vec<ObjectRecord>> {
    let mut records = Vec::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = ListRequest::new(bucket, prefix)
            .with_marker(marker.take())
            .with_limit(MAX_LIST_LIMIT);
        let page = client.list(&request).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                prefix = %prefix,
                pages_fetched = pages,
                "Listing page failed"
            );
            e
        })?;
        pages += 1;

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            page = pages,
            items = page.items.len(),
            "Fetched listing page"
        );

        marker = page.next_marker().map(String::from);
        records.extend(page.items);
        if marker.is_none() {
            break;
        }
    }

    Ok(records)
}

/// Fetch and shape a listing in one step. Placeholders are kept.
pub async fn list_entries(
    client: &dyn BucketClient,
    bucket: &str,
    prefix: &str,
    recursive: bool,
) -> StorageResult<Vec<ListingEntry>> {
    let records = fetch_all_records(client, bucket, prefix).await?;
    Ok(build_listing(records, prefix, recursive))
}
