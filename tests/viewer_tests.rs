use pdf_page_viewer::dom::Element;
use pdf_page_viewer::engine::PdfDocument;
use pdf_page_viewer::host::ScaleData;
use pdf_page_viewer::test_utils::{FakeDocument, FakePage, RenderCall, RenderLog};
use pdf_page_viewer::utils::{PDF_TO_CSS_UNITS, SCALE_FACTOR_PROPERTY};
use pdf_page_viewer::viewer::{MAX_CACHE_SIZE, ViewerEvent};
use pdf_page_viewer::{PdfViewer, ViewerError, ViewerOptions};

async fn loaded_viewer(page_count: usize) -> (PdfViewer<FakeDocument>, RenderLog) {
    let log = RenderLog::default();
    let mut viewer = PdfViewer::new(ViewerOptions::new(Element::new("div")));
    viewer
        .set_document(FakeDocument::new(page_count, &log))
        .await
        .unwrap();
    (viewer, log)
}

fn page_div(viewer: &PdfViewer<FakeDocument>, page_number: usize) -> Option<Element> {
    viewer.page_view(page_number)?.element().cloned()
}

#[tokio::test]
async fn valid_rotations_are_accepted() {
    let (mut viewer, _) = loaded_viewer(2).await;
    viewer.set_page_number(1).await.unwrap();

    for angle in [90, 180, 270, 0, -90, -180, 360, 450, 720, -270] {
        viewer.set_rotation(angle).await.unwrap();
        assert_eq!(viewer.pages_rotation(), angle);
    }
}

#[tokio::test]
async fn invalid_rotations_are_rejected() {
    let (mut viewer, _) = loaded_viewer(2).await;
    viewer.set_page_number(1).await.unwrap();

    for angle in [1, 45, 89, 91, -45, 135, 359] {
        let err = viewer.set_rotation(angle).await.unwrap_err();
        assert!(matches!(err, ViewerError::InvalidRotation(a) if a == angle));
        assert_eq!(viewer.pages_rotation(), 0);
    }
}

#[tokio::test]
async fn page_numbers_outside_document_are_rejected() {
    let (mut viewer, _) = loaded_viewer(3).await;

    for page_number in [0, 4, 100] {
        let err = viewer.set_page_number(page_number).await.unwrap_err();
        assert!(matches!(err, ViewerError::InvalidPageNumber(n) if n == page_number));
    }
    for page_number in 1..=3 {
        viewer.set_page_number(page_number).await.unwrap();
        assert_eq!(viewer.current_page_number(), page_number);
    }
}

#[tokio::test]
async fn set_page_number_needs_a_document() {
    let mut viewer: PdfViewer<FakeDocument> =
        PdfViewer::new(ViewerOptions::new(Element::new("div")));
    assert!(matches!(
        viewer.set_page_number(1).await,
        Err(ViewerError::NoDocument)
    ));
}

#[tokio::test]
async fn second_document_is_ignored() {
    let log = RenderLog::default();
    let (tx, rx) = flume::unbounded();
    let mut options = ViewerOptions::new(Element::new("div"));
    options.events = Some(tx);
    let mut viewer = PdfViewer::new(options);

    viewer.set_document(FakeDocument::new(3, &log)).await.unwrap();
    viewer.set_page_number(2).await.unwrap();
    let div = page_div(&viewer, 2).unwrap();

    viewer.set_document(FakeDocument::new(7, &log)).await.unwrap();

    assert_eq!(viewer.pages_count(), 3);
    assert_eq!(viewer.document().unwrap().num_pages(), 3);
    assert!(page_div(&viewer, 2).unwrap().ptr_eq(&div));
    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![ViewerEvent::PagesInit { page_count: 3 }]
    );
}

#[tokio::test]
async fn three_page_document_prerenders_neighbors() {
    let (mut viewer, log) = loaded_viewer(3).await;
    viewer.set_page_number(2).await.unwrap();

    let container = viewer.viewer_element().clone();
    let page2 = viewer.page_view(2).unwrap();
    assert!(page2.is_attached());
    assert!(container.contains_child(page2.element().unwrap()));

    for neighbor in [1, 3] {
        let view = viewer.page_view(neighbor).unwrap();
        assert!(view.is_rendered());
        assert!(!view.is_attached());
        assert_eq!(log.rasterizations(neighbor), 1);
    }
    assert_eq!(container.child_count(), 1);

    let mut cached = viewer.cached_pages();
    cached.sort_unstable();
    assert_eq!(cached, vec![1, 2, 3]);

    // Travelling forward pre-renders the next page before the previous one.
    assert_eq!(log.rasterized_pages(), vec![2, 3, 1]);
}

async fn viewer_with_pages(pages: &[FakePage]) -> PdfViewer<FakeDocument> {
    let mut viewer = PdfViewer::new(ViewerOptions::new(Element::new("div")));
    viewer
        .set_document(FakeDocument::with_pages(pages.to_vec()))
        .await
        .unwrap();
    viewer
}

#[tokio::test]
async fn failed_neighbor_is_rendered_fresh_on_visit() {
    let log = RenderLog::default();
    let pages: Vec<_> = (1..=3).map(|n| FakePage::letter(n, log.clone())).collect();
    let mut viewer = viewer_with_pages(&pages).await;

    pages[1].cancel_next_rasterization();
    viewer.set_page_number(1).await.unwrap();
    assert_eq!(viewer.current_page_number(), 1);
    assert!(!viewer.page_view(2).unwrap().is_rendered());
    assert_eq!(viewer.cached_pages(), vec![1]);

    viewer.set_page_number(2).await.unwrap();
    assert_eq!(log.rasterizations(2), 1);
    let page2 = viewer.page_view(2).unwrap();
    assert!(page2.is_attached());
    let canvas_layer = page2.element().unwrap().child_by_class("canvasLayer").unwrap();
    assert_eq!(canvas_layer.child_count(), 1);
}

#[tokio::test]
async fn failed_page_is_not_displayed_and_can_be_retried() {
    let log = RenderLog::default();
    let pages: Vec<_> = (1..=2).map(|n| FakePage::letter(n, log.clone())).collect();
    let mut viewer = viewer_with_pages(&pages).await;

    pages[0].cancel_next_rasterization();
    assert!(viewer.set_page_number(1).await.is_err());
    assert_eq!(viewer.current_page_number(), 0);
    assert!(!viewer.page_view(1).unwrap().is_rendered());
    assert!(!viewer.cached_pages().contains(&1));
    assert_eq!(viewer.viewer_element().child_count(), 0);

    viewer.set_page_number(1).await.unwrap();
    assert_eq!(viewer.current_page_number(), 1);
    assert!(viewer.page_view(1).unwrap().is_attached());
    assert_eq!(log.rasterizations(1), 1);
}

#[tokio::test]
async fn returning_to_a_cached_page_does_not_rerender() {
    let (mut viewer, log) = loaded_viewer(3).await;
    viewer.set_page_number(2).await.unwrap();
    viewer.set_page_number(3).await.unwrap();

    assert_eq!(log.rasterizations(3), 1);
    assert!(!viewer.page_view(2).unwrap().is_attached());
    assert!(viewer.page_view(3).unwrap().is_attached());
    assert_eq!(viewer.viewer_element().child_count(), 1);
}

#[tokio::test]
async fn rotation_rerenders_current_page_and_resets_others() {
    let (mut viewer, log) = loaded_viewer(3).await;
    viewer.set_page_number(2).await.unwrap();
    let page1 = page_div(&viewer, 1).unwrap();
    let page2 = page_div(&viewer, 2).unwrap();
    let page3 = page_div(&viewer, 3).unwrap();
    log.clear();

    viewer.set_rotation(90).await.unwrap();

    assert!(page_div(&viewer, 2).unwrap().ptr_eq(&page2));
    assert!(viewer.page_view(2).unwrap().is_attached());
    assert_eq!(log.rasterizations(2), 1);
    assert!(!page_div(&viewer, 1).unwrap().ptr_eq(&page1));
    assert!(!page_div(&viewer, 3).unwrap().ptr_eq(&page3));
    assert!(
        log.calls()
            .iter()
            .all(|call| !matches!(call, RenderCall::Rasterize { rotation, .. } if *rotation != 90))
    );

    // Page 2 rendered first, from a cache holding only itself.
    assert_eq!(log.rasterized_pages()[0], 2);
    assert_eq!(viewer.cached_pages()[0], 2);
    assert_eq!(viewer.cached_pages().len(), 3);
}

#[tokio::test]
async fn rotation_without_displayed_page_is_deferred() {
    let (mut viewer, log) = loaded_viewer(3).await;
    viewer.set_rotation(180).await.unwrap();

    assert_eq!(viewer.pages_rotation(), 180);
    assert!(log.calls().is_empty());

    viewer.set_page_number(1).await.unwrap();
    assert!(matches!(
        log.calls()[0],
        RenderCall::Rasterize { rotation: 180, .. }
    ));
}

#[tokio::test]
async fn visiting_eleven_pages_evicts_the_first_one_first() {
    let (mut viewer, _) = loaded_viewer(30).await;

    for page_number in 1..=9 {
        viewer.set_page_number(page_number).await.unwrap();
        assert!(viewer.cached_pages().contains(&1));
    }

    viewer.set_page_number(10).await.unwrap();
    assert!(!viewer.cached_pages().contains(&1));
    assert!(viewer.cached_pages().contains(&2));
    assert!(!viewer.page_view(1).unwrap().is_rendered());

    viewer.set_page_number(11).await.unwrap();
    assert!(!viewer.cached_pages().contains(&2));
    assert!(viewer.cached_pages().contains(&11));
    assert_eq!(viewer.cached_pages().len(), MAX_CACHE_SIZE);
}

#[tokio::test]
async fn cache_stays_bounded_and_holds_current_page() {
    let (mut viewer, _) = loaded_viewer(30).await;
    let pages = [1, 5, 6, 30, 29, 2, 17, 18, 19, 3, 25, 24, 23, 12, 1];

    for (step, page_number) in pages.into_iter().enumerate() {
        viewer.set_page_number(page_number).await.unwrap();
        if step % 4 == 1 {
            viewer.set_rotation(90 * step as i32).await.unwrap();
        }
        if step % 5 == 2 {
            viewer.set_scale(1.0 + step as f64 / 10.0).await.unwrap();
        }

        let cached = viewer.cached_pages();
        assert!(cached.len() <= MAX_CACHE_SIZE);
        assert!(cached.contains(&viewer.current_page_number()));
        for page in 1..=30 {
            let rendered = viewer.page_view(page).unwrap().is_rendered();
            assert_eq!(rendered, cached.contains(&page), "page {page}");
        }
    }
}

#[tokio::test]
async fn scale_gesture_rerenders_once_at_the_end() {
    let (mut viewer, log) = loaded_viewer(3).await;
    viewer.set_page_number(1).await.unwrap();
    log.clear();

    viewer.on_scale_begin();
    assert!(viewer.is_scaling());

    let data = ScaleData {
        scale: 2.0,
        focus_x: 100.0,
        focus_y: 100.0,
    };
    viewer.on_scale(data).unwrap();

    assert!(log.calls().is_empty());
    assert_eq!(viewer.scale(), 2.0);
    assert_eq!(
        viewer.viewer_element().style(SCALE_FACTOR_PROPERTY),
        Some((2.0 * PDF_TO_CSS_UNITS).to_string())
    );
    assert_eq!(viewer.window().scroll_x, 100.0);
    assert_eq!(viewer.window().scroll_y, 100.0);

    viewer.on_scale_end(data).await.unwrap();

    assert!(!viewer.is_scaling());
    assert_eq!(log.rasterizations(1), 1);
    assert!(matches!(
        log.calls()[0],
        RenderCall::Rasterize { page: 1, .. }
    ));
}

#[tokio::test]
async fn unchanged_scale_is_a_noop() {
    let (mut viewer, log) = loaded_viewer(2).await;
    viewer.set_page_number(1).await.unwrap();
    log.clear();

    viewer.set_scale(1.0).await.unwrap();
    assert!(log.calls().is_empty());

    assert!(matches!(
        viewer.set_scale(0.0).await,
        Err(ViewerError::InvalidScale(_))
    ));
    assert!(matches!(
        viewer.set_scale(f64::NAN).await,
        Err(ViewerError::InvalidScale(_))
    ));
}

#[tokio::test]
async fn rejected_gesture_end_leaves_scaling_mode() {
    let (mut viewer, log) = loaded_viewer(2).await;
    viewer.set_page_number(1).await.unwrap();
    log.clear();

    viewer.on_scale_begin();
    let end = ScaleData {
        scale: 0.0,
        focus_x: 0.0,
        focus_y: 0.0,
    };
    assert!(matches!(
        viewer.on_scale_end(end).await,
        Err(ViewerError::InvalidScale(_))
    ));
    assert!(!viewer.is_scaling());

    viewer.set_scale(1.0).await.unwrap();
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn oversized_pages_render_at_reduced_resolution() {
    let log = RenderLog::default();
    let mut options = ViewerOptions::new(Element::new("div"));
    options.max_canvas_pixels = 100_000;
    let mut viewer = PdfViewer::new(options);
    viewer.set_document(FakeDocument::new(1, &log)).await.unwrap();
    viewer.set_page_number(1).await.unwrap();

    let RenderCall::Rasterize { width, height, .. } = log.calls()[0].clone() else {
        panic!("expected a rasterization");
    };
    assert!(u64::from(width) * u64::from(height) <= 100_000);
}

#[tokio::test]
async fn next_and_previous_page_shims() {
    let (mut viewer, _) = loaded_viewer(3).await;
    viewer.set_page_number(1).await.unwrap();

    viewer.next_page().await.unwrap();
    assert_eq!(viewer.current_page_number(), 2);
    viewer.previous_page().await.unwrap();
    assert_eq!(viewer.current_page_number(), 1);
    assert!(viewer.previous_page().await.is_err());
    assert_eq!(viewer.current_page_number(), 1);
}
