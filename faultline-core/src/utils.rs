//! Useful utilities for working with reports.

/// Parse the types name from `Debug` output.
///
/// # Examples
///
/// ```
/// use faultline_core::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: std::fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{d:#?}");

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

#[test]
fn test_parse_type_from_debug() {
    use parse_type_from_debug as parse;
    #[derive(Debug)]
    struct MyStruct;
    assert_eq!(&parse(&MyStruct), "MyStruct");

    let err = "NaN".parse::<usize>().unwrap_err();
    assert_eq!(&parse(&err), "ParseIntError");

    let err = "".parse::<crate::protocol::ReportId>().unwrap_err();
    assert_eq!(&parse(&err), "EmptyValue");

    let err = std::io::Error::new(std::io::ErrorKind::Other, "nope");
    assert_eq!(&parse(&err), "Custom");
}
