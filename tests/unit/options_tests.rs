// Options parsing leniency and digest properties

use hyperpic::image_optimizer::{Crop, Fit, Format, Options, Orientation};
use rstest::rstest;

#[rstest]
#[case("fit=contain", Fit::Contain)]
#[case("fit=max", Fit::Max)]
#[case("fit=fill", Fit::Fill)]
#[case("fit=stretch", Fit::Stretch)]
#[case("fit=crop-focal-point", Fit::CropFocalPoint)]
#[case("fit=nonsense", Fit::Contain)]
fn test_fit_parsing(#[case] query: &str, #[case] expected: Fit) {
    assert_eq!(Options::from_query(query).unwrap().fit, expected);
}

#[rstest]
#[case("or=90", Orientation::D90)]
#[case("or=180", Orientation::D180)]
#[case("or=271", Orientation::D0)]
#[case("or=x", Orientation::D0)]
fn test_orientation_parsing(#[case] query: &str, #[case] expected: Orientation) {
    assert_eq!(Options::from_query(query).unwrap().orientation, expected);
}

#[test]
fn test_crop_component_fallback_is_per_component() {
    let options = Options::from_query("crop=100,abc,5,").unwrap();
    assert_eq!(
        options.crop,
        Crop {
            width: 100,
            height: -1,
            x: 5,
            y: -1
        }
    );

    let options = Options::from_query("crop=1,2,3").unwrap();
    assert_eq!(options.crop, Crop::default());
}

#[test]
fn test_unparseable_numbers_fall_back_to_zero() {
    let options = Options::from_query("w=wide&h=&q=best&blur=-").unwrap();
    assert_eq!(options.width, 0);
    assert_eq!(options.height, 0);
    assert_eq!(options.quality, 0);
    assert_eq!(options.blur, 0);
}

#[test]
fn test_format_aliases() {
    assert_eq!(Options::from_query("fm=jpg").unwrap().format, Format::Jpeg);
    assert_eq!(Options::from_query("fm=jpeg").unwrap().format, Format::Jpeg);
    assert_eq!(Options::from_query("fm=webp").unwrap().format, Format::Webp);
    assert_eq!(Options::from_query("fm=bmp").unwrap().format, Format::Unknown);
}

#[test]
fn test_semantically_equal_options_hash_equal() {
    let a = Options::from_query("w=100&bg=white&fit=crop").unwrap();
    let b = Options::from_query("bg=255,255,255&fit=crop-center&w=100.2").unwrap();
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn test_unknown_keys_do_not_change_hash() {
    let a = Options::from_query("w=100").unwrap();
    let b = Options::from_query("w=100&utm_source=mail").unwrap();
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn test_hash_is_fixed_length() {
    for query in ["", "w=1", "w=1&h=2&fm=png&bg=red&crop=1,2,3,4"] {
        assert_eq!(Options::from_query(query).unwrap().hash().len(), 64);
    }
}
