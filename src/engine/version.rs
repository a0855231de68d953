/// Version split into numeric components and a free-form suffix.
#[derive(Debug, PartialEq, Eq)]
struct Version<'a> {
    major: u32,
    minor: u32,
    micro: u32,
    rest: &'a str,
}


fn parse_number(text: &str) -> Option<(u32, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());

    //
    // Leading zeros are not allowed, except for zero itself
    //

    if 0 == end || (end > 1 && text.starts_with('0')) {
        return None;
    }

    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}


fn parse_version(text: &str) -> Option<Version<'_>> {
    let (major, text) = parse_number(text)?;
    let (minor, text) = parse_number(text.strip_prefix('.')?)?;
    let (micro, rest) = parse_number(text.strip_prefix('.')?)?;

    Some(Version { major, minor, micro, rest })
}


/// Check if `version` satisfies `required`.
///
/// Both have the form `MAJOR.MINOR.MICRO[suffix]`. Numbers are compared
/// numerically, equal numbers fall back to comparing suffixes.
/// Unparsable or missing versions never satisfy the requirement.
///
/// * `version` - installed version
/// * `required` - minimal acceptable version
pub(crate) fn compare_versions(version: Option<&str>, required: Option<&str>) -> bool {
    let (Some(version), Some(required)) = (version, required) else {
        return false;
    };

    let (Some(mine), Some(theirs)) = (parse_version(version), parse_version(required)) else {
        return false;
    };

    (mine.major, mine.minor, mine.micro, mine.rest) >= (theirs.major, theirs.minor, theirs.micro, theirs.rest)
}


/// Extracts a version from the first line of `--version` output.
///
/// * `output` - output of the backend program
pub(crate) fn version_from_banner(output: &str) -> Option<String> {
    output.lines()
        .next()?
        .split_whitespace()
        .rev()
        .find(|word| parse_version(word).is_some())
        .map(str::to_owned)
}
