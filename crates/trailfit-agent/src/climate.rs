//! Location to climate lookup.

use trailfit_core::Climate;

const CITY_CLIMATES: &[(&str, Climate)] = &[
    // Very cold
    ("fairbanks", Climate::VeryCold),
    ("utqiagvik", Climate::VeryCold),
    ("barrow", Climate::VeryCold),
    ("nome", Climate::VeryCold),
    ("yellowknife", Climate::VeryCold),
    ("whitehorse", Climate::VeryCold),
    ("international falls", Climate::VeryCold),
    ("duluth", Climate::VeryCold),
    ("winnipeg", Climate::VeryCold),
    ("edmonton", Climate::VeryCold),
    // Cold
    ("fargo", Climate::Cold),
    ("bismarck", Climate::Cold),
    ("grand forks", Climate::Cold),
    ("sioux falls", Climate::Cold),
    ("minneapolis", Climate::Cold),
    ("st paul", Climate::Cold),
    ("saint paul", Climate::Cold),
    ("madison", Climate::Cold),
    ("milwaukee", Climate::Cold),
    ("chicago", Climate::Cold),
    ("detroit", Climate::Cold),
    ("buffalo", Climate::Cold),
    ("burlington", Climate::Cold),
    ("anchorage", Climate::Cold),
    ("boston", Climate::Cold),
    ("aspen", Climate::Cold),
    ("vail", Climate::Cold),
    ("banff", Climate::Cold),
    ("calgary", Climate::Cold),
    ("montreal", Climate::Cold),
    ("quebec city", Climate::Cold),
    ("ottawa", Climate::Cold),
    ("toronto", Climate::Cold),
    ("chamonix", Climate::Cold),
    ("zermatt", Climate::Cold),
    ("oslo", Climate::Cold),
    ("stockholm", Climate::Cold),
    ("helsinki", Climate::Cold),
    ("moscow", Climate::Cold),
    // Cool
    ("denver", Climate::Cool),
    ("boulder", Climate::Cool),
    ("salt lake city", Climate::Cool),
    ("boise", Climate::Cool),
    ("spokane", Climate::Cool),
    ("new york", Climate::Cool),
    ("philadelphia", Climate::Cool),
    ("pittsburgh", Climate::Cool),
    ("cleveland", Climate::Cool),
    ("london", Climate::Cool),
    ("edinburgh", Climate::Cool),
    ("amsterdam", Climate::Cool),
    ("berlin", Climate::Cool),
    ("reykjavik", Climate::Cool),
    // Rainy
    ("seattle", Climate::Rainy),
    ("portland", Climate::Rainy),
    ("olympia", Climate::Rainy),
    ("tacoma", Climate::Rainy),
    ("vancouver", Climate::Rainy),
    ("juneau", Climate::Rainy),
    ("bergen", Climate::Rainy),
    ("dublin", Climate::Rainy),
    ("glasgow", Climate::Rainy),
    // Mild
    ("san francisco", Climate::Mild),
    ("oakland", Climate::Mild),
    ("san diego", Climate::Mild),
    ("santa barbara", Climate::Mild),
    ("atlanta", Climate::Mild),
    ("nashville", Climate::Mild),
    ("raleigh", Climate::Mild),
    ("washington", Climate::Mild),
    ("lisbon", Climate::Mild),
    ("barcelona", Climate::Mild),
    ("melbourne", Climate::Mild),
    ("paris", Climate::Mild),
    // Warm
    ("los angeles", Climate::Warm),
    ("la", Climate::Warm),
    ("austin", Climate::Warm),
    ("dallas", Climate::Warm),
    ("san antonio", Climate::Warm),
    ("charleston", Climate::Warm),
    ("honolulu", Climate::Warm),
    ("sydney", Climate::Warm),
    // Hot
    ("phoenix", Climate::Hot),
    ("tucson", Climate::Hot),
    ("las vegas", Climate::Hot),
    ("palm springs", Climate::Hot),
    ("el paso", Climate::Hot),
    ("houston", Climate::Hot),
    ("new orleans", Climate::Hot),
    ("miami", Climate::Hot),
    ("orlando", Climate::Hot),
    ("tampa", Climate::Hot),
    ("dubai", Climate::Hot),
];

const REGION_CLIMATES: &[(&str, Climate)] = &[
    ("yukon", Climate::VeryCold),
    ("nunavut", Climate::VeryCold),
    ("northwest territories", Climate::VeryCold),
    ("manitoba", Climate::VeryCold),
    ("saskatchewan", Climate::VeryCold),
    ("alaska", Climate::Cold),
    ("ak", Climate::Cold),
    ("north dakota", Climate::Cold),
    ("nd", Climate::Cold),
    ("south dakota", Climate::Cold),
    ("sd", Climate::Cold),
    ("minnesota", Climate::Cold),
    ("mn", Climate::Cold),
    ("wisconsin", Climate::Cold),
    ("wi", Climate::Cold),
    ("michigan", Climate::Cold),
    ("mi", Climate::Cold),
    ("maine", Climate::Cold),
    ("me", Climate::Cold),
    ("vermont", Climate::Cold),
    ("vt", Climate::Cold),
    ("new hampshire", Climate::Cold),
    ("nh", Climate::Cold),
    ("montana", Climate::Cold),
    ("mt", Climate::Cold),
    ("wyoming", Climate::Cold),
    ("wy", Climate::Cold),
    ("alberta", Climate::Cold),
    ("ontario", Climate::Cold),
    ("quebec", Climate::Cold),
    ("colorado", Climate::Cool),
    ("co", Climate::Cool),
    ("utah", Climate::Cool),
    ("ut", Climate::Cool),
    ("idaho", Climate::Cool),
    ("id", Climate::Cool),
    ("new york", Climate::Cool),
    ("ny", Climate::Cool),
    ("massachusetts", Climate::Cool),
    ("ma", Climate::Cool),
    ("pennsylvania", Climate::Cool),
    ("pa", Climate::Cool),
    ("ohio", Climate::Cool),
    ("oh", Climate::Cool),
    ("washington", Climate::Rainy),
    ("wa", Climate::Rainy),
    ("oregon", Climate::Rainy),
    ("or", Climate::Rainy),
    ("british columbia", Climate::Rainy),
    ("bc", Climate::Rainy),
    ("california", Climate::Mild),
    ("ca", Climate::Mild),
    ("georgia", Climate::Mild),
    ("ga", Climate::Mild),
    ("tennessee", Climate::Mild),
    ("tn", Climate::Mild),
    ("north carolina", Climate::Mild),
    ("nc", Climate::Mild),
    ("texas", Climate::Warm),
    ("tx", Climate::Warm),
    ("new mexico", Climate::Warm),
    ("nm", Climate::Warm),
    ("hawaii", Climate::Warm),
    ("hi", Climate::Warm),
    ("arizona", Climate::Hot),
    ("az", Climate::Hot),
    ("nevada", Climate::Hot),
    ("nv", Climate::Hot),
    ("florida", Climate::Hot),
    ("fl", Climate::Hot),
    ("louisiana", Climate::Hot),
];

/// Infer a climate from a city and/or region.
///
/// The city wins over the region. A city written as `"Fargo, ND"` is split at
/// the first comma and the trailing part is tried as a region. Unknown
/// locations yield `None`.
#[must_use]
pub fn infer(city: Option<&str>, region: Option<&str>) -> Option<Climate> {
    let mut embedded_region = None;
    if let Some(city) = city {
        let (name, rest) = match city.split_once(',') {
            Some((name, rest)) => (name, Some(rest)),
            None => (city, None),
        };
        if let Some(climate) = lookup(CITY_CLIMATES, name) {
            return Some(climate);
        }
        embedded_region = rest;
    }

    embedded_region
        .and_then(|r| lookup(REGION_CLIMATES, r))
        .or_else(|| region.and_then(|r| lookup(REGION_CLIMATES, r)))
}

fn lookup(table: &[(&str, Climate)], name: &str) -> Option<Climate> {
    let key = name
        .trim()
        .trim_end_matches('.')
        .replace('.', "")
        .to_lowercase();
    if key.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|&&(entry, _)| entry == key)
        .map(|&(_, climate)| climate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fargo_is_cold() {
        assert_eq!(infer(Some("Fargo"), None), Some(Climate::Cold));
        assert_eq!(infer(Some("  fargo "), None), Some(Climate::Cold));
    }

    #[test]
    fn nothing_known_is_none() {
        assert_eq!(infer(None, None), None);
        assert_eq!(infer(Some("Atlantis"), None), None);
        assert_eq!(infer(Some(""), Some("")), None);
    }

    #[test]
    fn city_takes_precedence_over_region() {
        assert_eq!(infer(Some("Seattle"), Some("Arizona")), Some(Climate::Rainy));
    }

    #[test]
    fn unknown_city_falls_back_to_region() {
        assert_eq!(infer(Some("Smallville"), Some("Minnesota")), Some(Climate::Cold));
        assert_eq!(infer(None, Some("AZ")), Some(Climate::Hot));
    }

    #[test]
    fn comma_separated_city_and_region() {
        assert_eq!(infer(Some("Fargo, ND"), None), Some(Climate::Cold));
        assert_eq!(infer(Some("Smallville, Yukon"), None), Some(Climate::VeryCold));
    }

    #[test]
    fn dotted_abbreviations() {
        assert_eq!(infer(Some("St. Paul"), None), Some(Climate::Cold));
    }
}
