mod helpers;

use bytes::Bytes;
use futures::StreamExt;
use helpers::{TestBucket, TestFile, BUCKET};
use qiniu_fs_storage::{
    create_adapter, EntryKind, ListingExt, MemoryClientFactory, Protocol, QiniuConfig,
    StorageAdapter, StorageError, ThumbnailOptions, Visibility, WriteOptions, BLOCK_SIZE,
};

#[tokio::test]
async fn test_write_then_stat_round_trip() {
    let bucket = TestBucket::new();
    let data = Bytes::from_static(b"hello qiniu");

    let result = bucket
        .adapter
        .write("/docs//readme.txt", data.clone(), &WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.path, "docs/readme.txt");

    let entry = bucket.adapter.stat("docs/readme.txt").await.unwrap();
    assert_eq!(entry.path, "docs/readme.txt");
    assert_eq!(entry.size, Some(data.len() as u64));
    assert_eq!(entry.mimetype.as_deref(), Some("application/octet-stream"));

    assert_eq!(bucket.adapter.get_size("docs/readme.txt").await.unwrap(), 11);
    assert!(bucket.adapter.get_timestamp("docs/readme.txt").await.unwrap() > 0);
}

#[tokio::test]
async fn test_write_forwards_mime_and_custom_vars() {
    let bucket = TestBucket::new();
    let options = WriteOptions::default()
        .with_mime("image/png")
        .with_param("x:owner", "alice")
        .with_param("endUser", "dropped");

    bucket
        .adapter
        .write("pic.png", Bytes::from_static(b"png"), &options)
        .await
        .unwrap();

    assert_eq!(
        bucket.adapter.get_mimetype("pic.png").await.unwrap(),
        "image/png"
    );
    let params = bucket.store.params(BUCKET, "pic.png").unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params.get("x:owner").map(String::as_str), Some("alice"));
}

#[tokio::test]
async fn test_write_stream_small_file_single_upload() {
    let bucket = TestBucket::new();
    let file = TestFile::new(1024);

    bucket
        .adapter
        .write_stream("small.bin", file.reader().await, Some(file.len()), &WriteOptions::default())
        .await
        .unwrap();

    assert!(!bucket.store.was_resumable(BUCKET, "small.bin"));
    assert_eq!(
        bucket.store.get(BUCKET, "small.bin").unwrap(),
        Bytes::from(file.contents.clone())
    );
}

#[tokio::test]
async fn test_write_stream_above_block_size_is_resumable() {
    let bucket = TestBucket::new();
    let file = TestFile::new(BLOCK_SIZE as usize + 1);

    bucket
        .adapter
        .write_stream("large.bin", file.reader().await, Some(file.len()), &WriteOptions::default())
        .await
        .unwrap();

    assert!(bucket.store.was_resumable(BUCKET, "large.bin"));
    assert_eq!(bucket.adapter.get_size("large.bin").await.unwrap(), file.len());
}

#[tokio::test]
async fn test_write_stream_unknown_length_reads_everything() {
    let bucket = TestBucket::new();
    let file = TestFile::new(BLOCK_SIZE as usize + 10);

    bucket
        .adapter
        .update_stream("unknown.bin", file.reader().await, None, &WriteOptions::default())
        .await
        .unwrap();

    assert!(!bucket.store.was_resumable(BUCKET, "unknown.bin"));
    assert_eq!(bucket.adapter.get_size("unknown.bin").await.unwrap(), file.len());
}

#[tokio::test]
async fn test_write_stream_from_byte_stream() {
    let bucket = TestBucket::new();
    let chunks = futures::stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"chunk-1/")),
        Ok(Bytes::from_static(b"chunk-2")),
    ]);
    let reader = Box::pin(tokio_util::io::StreamReader::new(chunks));

    bucket
        .adapter
        .write_stream("joined.txt", reader, None, &WriteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        bucket.adapter.read("joined.txt").await.unwrap(),
        Bytes::from_static(b"chunk-1/chunk-2")
    );
}

#[tokio::test]
async fn test_write_stream_rejects_length_mismatch() {
    let bucket = TestBucket::new();

    let longer = TestFile::new(10);
    let err = bucket
        .adapter
        .write_stream("s.txt", longer.reader().await, Some(3), &WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));

    let shorter = TestFile::new(2);
    let err = bucket
        .adapter
        .write_stream("t.txt", shorter.reader().await, Some(10), &WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));

    assert!(bucket.store.keys(BUCKET).is_empty());
}

#[tokio::test]
async fn test_root_is_not_an_object_key() {
    let bucket = TestBucket::new();
    bucket.seed(&["a.txt"]);
    let options = WriteOptions::default();

    for path in ["/", "", "a/.."] {
        let err = bucket
            .adapter
            .write(path, Bytes::from_static(b"x"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)), "path {:?}", path);
    }

    let file = TestFile::new(4);
    let result = bucket
        .adapter
        .write_stream("/", file.reader().await, Some(4), &options)
        .await;
    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));

    assert!(bucket.adapter.rename("a.txt", "/").await.is_err());
    assert!(bucket.adapter.copy("/", "b.txt").await.is_err());
    assert!(bucket.adapter.delete("").await.is_err());
    assert!(bucket.adapter.stat("/").await.is_err());
    assert!(bucket.adapter.read("/").await.is_err());
    assert!(bucket.adapter.get_url("").is_err());

    assert_eq!(bucket.store.keys(BUCKET), vec!["a.txt"]);
    let listing = bucket.adapter.list_contents("", false).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].basename, "a.txt");

    // the root itself still answers existence checks
    assert!(bucket.adapter.has("/").await.unwrap());
}

#[test]
fn test_parent_segment_keep_name_rejected() {
    let mut config = QiniuConfig::new("ak", "sk", BUCKET, helpers::DOMAIN);
    config.keep_name = "..".to_string();
    let result = create_adapter(&config, &MemoryClientFactory::default());
    assert!(matches!(result, Err(StorageError::ConfigError(_))));
}

#[tokio::test]
async fn test_rename_copy_delete() {
    let bucket = TestBucket::new();
    bucket.seed(&["a.txt"]);

    bucket.adapter.copy("a.txt", "/b.txt").await.unwrap();
    bucket.adapter.rename("a.txt", "moved/c.txt").await.unwrap();
    assert_eq!(bucket.store.keys(BUCKET), vec!["b.txt", "moved/c.txt"]);

    bucket.adapter.delete("b.txt").await.unwrap();
    assert!(!bucket.adapter.has("b.txt").await.unwrap());

    let err = bucket.adapter.delete("b.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_copy_onto_existing_key_fails() {
    let bucket = TestBucket::new();
    bucket.seed(&["a.txt", "b.txt"]);

    let err = bucket.adapter.copy("a.txt", "b.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::Store { code: 614, .. }));
}

#[tokio::test]
async fn test_has_files_and_directories() {
    let bucket = TestBucket::new();
    bucket.seed(&["photos/2020/cat.jpg", "photosynthesis.txt"]);

    assert!(bucket.adapter.has("photos/2020/cat.jpg").await.unwrap());
    assert!(bucket.adapter.has("photos").await.unwrap());
    assert!(bucket.adapter.has("/photos/2020/").await.unwrap());
    assert!(!bucket.adapter.has("photo").await.unwrap());
    assert!(!bucket.adapter.has("missing.txt").await.unwrap());
}

#[tokio::test]
async fn test_path_outside_root_rejected() {
    let bucket = TestBucket::new();
    let err = bucket
        .adapter
        .write("../escape.txt", Bytes::new(), &WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_create_dir_placeholder_hidden_from_listing() {
    let bucket = TestBucket::new();

    let entry = bucket
        .adapter
        .create_dir("/empty/", &WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Dir);
    assert_eq!(entry.path, "empty");
    assert!(bucket.store.contains(BUCKET, "empty/.keep"));
    assert!(bucket.adapter.has("empty").await.unwrap());

    let listing = bucket.adapter.list_contents("", false).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].path, "empty");
    assert!(bucket.adapter.list_contents("empty", true).await.unwrap().is_empty());

    let internal = bucket
        .adapter
        .list_contents_including_keep("empty", true)
        .await
        .unwrap();
    assert_eq!(internal.len(), 1);
    assert_eq!(internal[0].path, "empty/.keep");
}

#[tokio::test]
async fn test_delete_dir_keep_removes_only_placeholder() {
    let bucket = TestBucket::new();
    bucket.seed(&["dir/.keep", "dir/file.txt"]);

    bucket.adapter.delete_dir_keep("dir").await.unwrap();
    assert_eq!(bucket.store.keys(BUCKET), vec!["dir/file.txt"]);

    // no placeholder left: still fine
    bucket.adapter.delete_dir_keep("dir").await.unwrap();
}

#[tokio::test]
async fn test_delete_dir_removes_everything_below() {
    let bucket = TestBucket::new();
    bucket.seed(&[
        "dir/.keep",
        "dir/a.txt",
        "dir/sub/.keep",
        "dir/sub/b.txt",
        "dirty.txt",
        "other/c.txt",
    ]);

    bucket.adapter.delete_dir("/dir/").await.unwrap();
    assert_eq!(bucket.store.keys(BUCKET), vec!["dirty.txt", "other/c.txt"]);
}

#[tokio::test]
async fn test_delete_dir_batches_large_directories() {
    let bucket = TestBucket::new();
    let keys: Vec<String> = (0..2500).map(|i| format!("bulk/{:05}.txt", i)).collect();
    for key in &keys {
        bucket.store.insert(BUCKET, key, "x", "text/plain");
    }

    bucket.adapter.delete_dir("bulk").await.unwrap();
    assert!(bucket.store.keys(BUCKET).is_empty());
    // 3 listing pages
    assert_eq!(bucket.store.list_calls(), 3);
}

#[tokio::test]
async fn test_delete_dir_reports_failed_keys() {
    let bucket = TestBucket::new();
    bucket.seed(&["dir/a.txt", "dir/b.txt", "dir/c.txt"]);
    bucket.store.fail_delete("dir/b.txt");

    let err = bucket.adapter.delete_dir("dir").await.unwrap_err();
    match err {
        StorageError::BatchDelete { failed, total } => {
            assert_eq!(failed, vec!["dir/b.txt".to_string()]);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bucket.store.keys(BUCKET), vec!["dir/b.txt"]);
}

#[tokio::test]
async fn test_delete_dir_reports_unconfirmed_chunk() {
    let bucket = TestBucket::new();
    let keys: Vec<String> = (0..2500).map(|i| format!("bulk/{:05}.txt", i)).collect();
    for key in &keys {
        bucket.store.insert(BUCKET, key, "x", "text/plain");
    }
    bucket.store.fail_batch_call(1);

    let err = bucket.adapter.delete_dir("bulk").await.unwrap_err();
    match err {
        StorageError::BatchDelete { failed, total } => {
            assert_eq!(failed, keys[1000..2000].to_vec());
            assert_eq!(total, 2500);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bucket.store.keys(BUCKET), keys[1000..2000].to_vec());
}

#[tokio::test]
async fn test_folder_marker_keys() {
    let bucket = TestBucket::new();
    bucket.seed(&["folder/", "folder/a.txt", "lonely/"]);

    let root = bucket.adapter.list_contents("", false).await.unwrap();
    let root: Vec<(&str, EntryKind)> = root.iter().map(|e| (e.path.as_str(), e.kind)).collect();
    assert_eq!(root, vec![("folder", EntryKind::Dir), ("lonely", EntryKind::Dir)]);

    let folder = bucket.adapter.list_contents("folder", false).await.unwrap();
    assert_eq!(folder.len(), 1);
    assert_eq!(folder[0].basename, "a.txt");

    assert!(bucket.adapter.has("lonely").await.unwrap());

    bucket.adapter.delete_dir("folder").await.unwrap();
    bucket.adapter.delete_dir("lonely").await.unwrap();
    assert!(bucket.store.keys(BUCKET).is_empty());
}

#[tokio::test]
async fn test_delete_dir_root_rejected_and_empty_is_noop() {
    let bucket = TestBucket::new();
    bucket.seed(&["keep-me.txt"]);

    let err = bucket.adapter.delete_dir("/").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument(_)));

    bucket.adapter.delete_dir("nothing-here").await.unwrap();
    assert_eq!(bucket.store.keys(BUCKET), vec!["keep-me.txt"]);
}

#[tokio::test]
async fn test_listing_page_failure_fails_whole_listing() {
    let bucket = TestBucket::new();
    for i in 0..1500 {
        bucket
            .store
            .insert(BUCKET, &format!("many/{:04}", i), "x", "text/plain");
    }
    bucket.store.fail_list_call(1);

    let err = bucket.adapter.list_contents("many", false).await.unwrap_err();
    assert!(matches!(err, StorageError::Store { .. }));

    // a failed listing also aborts delete_dir before anything is removed
    bucket.store.fail_list_call(0);
    assert!(bucket.adapter.delete_dir("many").await.is_err());
    assert_eq!(bucket.store.keys(BUCKET).len(), 1500);

    let listing = bucket.adapter.list_contents("many", false).await.unwrap();
    assert_eq!(listing.len(), 1500);
}

#[tokio::test]
async fn test_read_and_read_stream() {
    let bucket = TestBucket::new();
    bucket
        .adapter
        .write("dir/a b.txt", Bytes::from_static(b"spaced"), &WriteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        bucket.adapter.read("dir/a b.txt").await.unwrap(),
        Bytes::from_static(b"spaced")
    );

    let mut stream = bucket.adapter.read_stream("/dir/a b.txt").await.unwrap();
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(collected, b"spaced");

    let err = bucket.adapter.read("dir/missing.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_urls() {
    let mut config = QiniuConfig::new("ak", "sk", helpers::BUCKET, "https://cdn.example.com/");
    config.private_protocol = Some(Protocol::Http);
    config.thumbnail = Some(ThumbnailOptions {
        mode: Some(1),
        quality: Some(80),
        ..Default::default()
    });
    let bucket = TestBucket::with_config(config);

    assert_eq!(
        bucket.adapter.get_url("/dir/a b.txt").unwrap(),
        "https://cdn.example.com/dir/a%20b.txt"
    );

    let private = bucket.adapter.private_download_url("x.txt").unwrap();
    assert!(private.starts_with("http://cdn.example.com/x.txt?e="));

    let thumb = bucket
        .adapter
        .thumbnail_url(
            "cat.jpg",
            &ThumbnailOptions {
                width: Some(30),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(thumb, "https://cdn.example.com/cat.jpg?imageView2/1/w/30/q/80");

    let private_thumb = bucket
        .adapter
        .private_thumbnail_url("cat.jpg", &ThumbnailOptions::default())
        .unwrap();
    assert!(private_thumb.starts_with("http://cdn.example.com/cat.jpg?imageView2/1/q/80&e="));

    assert_eq!(
        bucket
            .adapter
            .thumbnail_url_sized("cat.jpg", 2, Some(144), None)
            .unwrap(),
        "https://cdn.example.com/cat.jpg?imageView2/2/w/144"
    );
    assert!(bucket
        .adapter
        .thumbnail_url_sized("cat.jpg", 9, Some(144), None)
        .is_err());
}

#[tokio::test]
async fn test_upload_token_and_helpers() {
    let bucket = TestBucket::new();
    let token = bucket.adapter.upload_token(Some("/a/b.txt")).unwrap();
    assert!(token.contains("test-bucket:a/b.txt"));

    assert!(bucket.adapter.can_thumbnail("image/PNG"));
    assert!(!bucket.adapter.can_thumbnail("video/mp4"));

    assert_eq!(
        bucket.adapter.get_visibility("any").await.unwrap(),
        Visibility::Public
    );
    bucket
        .adapter
        .set_visibility("any", Visibility::Private)
        .await
        .unwrap();
    assert_eq!(
        bucket.adapter.get_visibility("any").await.unwrap(),
        Visibility::Public
    );
}

#[tokio::test]
async fn test_persistent_fop() {
    let mut config = QiniuConfig::new("ak", "sk", helpers::BUCKET, helpers::DOMAIN);
    config.notify_url = Some("https://hooks.example.com/pfop".to_string());
    let bucket = TestBucket::with_config(config);
    bucket.seed(&["video.mp4"]);

    let id = bucket
        .adapter
        .persistent_fop_execute(
            "/video.mp4",
            &["avthumb/m3u8".to_string()],
            Some("queue"),
            None,
            false,
        )
        .await
        .unwrap();

    let jobs = bucket.store.submitted_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].key, "video.mp4");
    assert_eq!(
        jobs[0].notify_url.as_deref(),
        Some("https://hooks.example.com/pfop")
    );

    let status = bucket.adapter.persistent_fop_status(&id).await.unwrap();
    assert_eq!(status["inputKey"], "video.mp4");
    assert_eq!(status["code"], 0);

    assert!(bucket
        .adapter
        .persistent_fop_execute("missing.mp4", &["avthumb/mp4".to_string()], None, None, false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_listing_helpers_through_contract_object() {
    let bucket = TestBucket::new();
    bucket.store.insert(BUCKET, "gallery/a.jpg", "x", "image/jpeg");
    bucket.store.insert(BUCKET, "gallery/b.txt", "x", "text/plain");

    let storage: std::sync::Arc<dyn StorageAdapter> = bucket.adapter.clone();
    let images = storage.list_images("gallery", false).await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].basename, "a.jpg");
}
