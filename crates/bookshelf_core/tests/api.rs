use bookshelf_core::api::default_service;
use bookshelf_core::{
    clear_all_books, configure, delete_book, get_book_by_id, get_books, save_book, BookInput,
    ErrorCode, Page, StoreConfig,
};

// One test per binary: the default store is process-wide.
#[tokio::test]
async fn process_wide_store_supports_full_lifecycle() {
    configure(StoreConfig::in_memory(), None).unwrap();
    let again = configure(StoreConfig::in_memory(), None).unwrap_err();
    assert!(again.contains("already initialized"));

    let id = save_book(&BookInput::new(
        "Bedtime",
        vec![Page::with_audio(b"lullaby".to_vec())],
    ))
    .await
    .unwrap();
    assert_eq!(get_books().await.unwrap().len(), 1);

    let mut book = get_book_by_id(id).await.unwrap().unwrap().into_input();
    book.title = "Bedtime (read aloud)".to_string();
    assert_eq!(save_book(&book).await.unwrap(), id);

    let err = save_book(&BookInput::new("Empty", vec![Page::blank()]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);

    assert!(delete_book(id).await.unwrap());
    assert!(delete_book(id).await.unwrap());
    assert!(get_book_by_id(id).await.unwrap().is_none());

    save_book(&BookInput::new("Another", vec![Page::with_image(b"x".to_vec())]))
        .await
        .unwrap();
    assert!(clear_all_books().await.unwrap());
    assert!(get_books().await.unwrap().is_empty());
    assert_eq!(default_service().connections().open_attempts(), 1);
}
