use anyhow::Result;
use haarsearch::store::IdentifierResolver;
use haarsearch::{
    Error, HaarIface, ImageDb, Match, MemoryStore, SignatureReader, SignatureStore, SketchType,
    blob,
};
use image::{DynamicImage, Rgb, RgbImage};
use rstest::*;

fn solid(color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(128, 128, Rgb(color)))
}

fn gradient(seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(200, 150, |x, y| {
        let r = (x * seed / 3 + y) % 256;
        let g = (y * seed / 2) % 256;
        let b = ((x + y) * (seed % 7 + 1)) % 256;
        Rgb([r as u8, g as u8, b as u8])
    }))
}

fn ids(matches: &[Match]) -> Vec<i64> {
    matches.iter().map(|m| m.id).collect()
}

#[fixture]
fn colors() -> HaarIface<MemoryStore> {
    let mut iface = HaarIface::new(MemoryStore::new());
    iface.index_image(1, &solid([255, 0, 0])).unwrap();
    iface.index_image(2, &solid([250, 5, 5])).unwrap();
    iface.index_image(3, &solid([0, 0, 255])).unwrap();
    iface
}

#[fixture]
fn corpus() -> HaarIface<MemoryStore> {
    let mut iface = HaarIface::new(MemoryStore::new());
    for seed in 1..=12 {
        iface.index_image(seed as i64, &gradient(seed)).unwrap();
    }
    iface
}

#[rstest]
#[case(SketchType::Scanned)]
#[case(SketchType::HandDrawn)]
fn red_ranks_before_blue(mut colors: HaarIface<MemoryStore>, #[case] sketch: SketchType) {
    let result = colors.best_matches_for_image(&solid([255, 0, 0]), 3, sketch).unwrap();
    assert_eq!(ids(&result), vec![1, 2, 3]);
    assert!(result[0].score <= result[1].score);
    assert!(result[1].score < result[2].score);
}

#[rstest]
fn top_k_is_limited(mut colors: HaarIface<MemoryStore>) {
    let result = colors.best_matches_for_image(&solid([255, 0, 0]), 2, SketchType::Scanned).unwrap();
    assert_eq!(ids(&result), vec![1, 2]);
    assert!(colors.best_matches_for_image(&solid([255, 0, 0]), 0, SketchType::Scanned).unwrap().is_empty());
}

#[rstest]
#[case(SketchType::Scanned)]
#[case(SketchType::HandDrawn)]
fn single_pixel_change_stays_close(#[case] sketch: SketchType) {
    let mut dotted = RgbImage::from_pixel(128, 128, Rgb([255, 0, 0]));
    dotted.put_pixel(64, 64, Rgb([0, 0, 255]));

    let mut iface = HaarIface::new(MemoryStore::new());
    iface.index_image(1, &solid([0, 0, 255])).unwrap();
    iface.index_image(2, &DynamicImage::ImageRgb8(dotted)).unwrap();
    iface.index_image(3, &solid([255, 0, 0])).unwrap();

    let result = iface.best_matches_for_image(&solid([255, 0, 0]), 3, sketch).unwrap();
    assert_eq!(ids(&result), vec![3, 2, 1]);
    assert!(result[0].score < result[1].score);
    assert!(result[1].score < result[2].score);
}

#[rstest]
fn worse_candidate_does_not_change_top_k(mut corpus: HaarIface<MemoryStore>) {
    let before = corpus.best_matches_for_image_id(1, 3, SketchType::Scanned).unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(before[0].id, 1);

    corpus.index_image(100, &solid([0, 255, 0])).unwrap();
    let after = corpus.best_matches_for_image_id(1, 3, SketchType::Scanned).unwrap();
    assert_eq!(after, before);
    assert!(!ids(&after).contains(&100));
}

#[rstest]
fn duplicates_group_identical_images() {
    let mut iface = HaarIface::new(MemoryStore::new());
    iface.index_image(1, &solid([255, 0, 0])).unwrap();
    iface.index_image(2, &solid([255, 0, 0])).unwrap();
    iface.index_image(3, &solid([0, 0, 255])).unwrap();

    let groups = iface.find_duplicates(&[1, 2, 3]).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[&1], vec![1, 2]);
}

#[rstest]
fn self_match_is_perfect(corpus: HaarIface<MemoryStore>) {
    for id in 1..=12 {
        let result = corpus.best_matches_for_image_id_with_threshold(id, 0.99, SketchType::Scanned).unwrap();
        assert_eq!(result.first().map(|m| m.id), Some(id));
        assert_eq!(result[0].score, 1.0);
    }
}

#[rstest]
#[case(0.0)]
#[case(0.3)]
#[case(0.8)]
#[case(1.0)]
fn similarity_is_normalized(corpus: HaarIface<MemoryStore>, #[case] fraction: f64) {
    let result = corpus.best_matches_for_image_id_with_threshold(4, fraction, SketchType::HandDrawn).unwrap();
    for m in &result {
        assert!((0.0..=1.0).contains(&m.score), "{:?}", m);
        assert!(m.score >= fraction - 1e-9);
    }
    assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
}

#[rstest]
fn higher_threshold_returns_subset(corpus: HaarIface<MemoryStore>) {
    let mut previous: Option<Vec<i64>> = None;
    for fraction in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
        let mut current = ids(&corpus.best_matches_for_image_id_with_threshold(7, fraction, SketchType::Scanned).unwrap());
        current.sort();
        if let Some(previous) = &previous {
            assert!(current.iter().all(|id| previous.contains(id)));
        }
        previous = Some(current);
    }
}

#[rstest]
fn signature_text_round_trip(mut corpus: HaarIface<MemoryStore>) {
    let image = gradient(9);
    let text = corpus.signature_as_text(&image).unwrap();
    let sig = corpus.compute_signature(&image).unwrap();
    assert_eq!(blob::from_base64(&text).unwrap(), sig);

    let by_text = corpus.best_matches_for_signature(&text, 5, SketchType::Scanned).unwrap();
    let by_image = corpus.best_matches_for_image(&image, 5, SketchType::Scanned).unwrap();
    assert_eq!(by_text, by_image);
    assert_eq!(by_text[0].id, 9);
}

#[rstest]
fn reindex_replaces_signature(mut colors: HaarIface<MemoryStore>) {
    colors.index_image(3, &solid([255, 0, 0])).unwrap();
    let result = colors.best_matches_for_image_id_with_threshold(1, 0.9, SketchType::Scanned).unwrap();
    assert_eq!(ids(&result), vec![1, 3, 2]);
}

#[test]
fn lmdb_store_end_to_end() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let red = dir.path().join("red.png");
    let blue = dir.path().join("blue.png");
    solid([255, 0, 0]).save(&red)?;
    solid([0, 0, 255]).save(&blue)?;

    let (red_id, blue_id) = {
        let mut iface = HaarIface::new(ImageDb::open(dir.path().join("db"))?);
        (iface.index_image_file(&red)?, iface.index_image_file(&blue)?)
    };

    // 重新打开后数据仍然存在
    let db = ImageDb::open(dir.path().join("db"))?;
    assert_eq!(db.reader()?.len()?, 2);
    assert_eq!(db.record(blue_id)?.map(|r| r.path), Some(blue.to_string_lossy().into_owned()));

    let mut iface = HaarIface::new(db);
    let result = iface.best_matches_for_file(&red, 2, SketchType::Scanned)?;
    assert_eq!(ids(&result), vec![red_id, blue_id]);

    // 不支持的签名版本需要重新索引
    let mut bytes = blob::encode(&iface.retrieve_signature(red_id)?);
    bytes[..4].copy_from_slice(&99i32.to_be_bytes());
    iface.store().put(red_id, &bytes)?;
    let err = iface.retrieve_signature(red_id).unwrap_err();
    assert!(matches!(err, Error::UnsupportedSignatureVersion(99)));
    assert!(err.needs_reindex());

    let result = iface.best_matches_for_file(&red, 2, SketchType::Scanned)?;
    assert_eq!(ids(&result), vec![blue_id]);

    Ok(())
}
