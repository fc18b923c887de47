//! Template messages. A language model may rephrase them, but every
//! response carries one.

use trailfit_core::{CatalogSummary, Direction, FeedbackSignal, SignalKind};
use trailfit_retrieval::SearchResult;

use crate::context::AppliedContext;
use crate::intent::Intent;
use crate::orchestrator::Notice;
use crate::styling::{OutfitPiece, OutfitPlan};

pub(crate) fn search(
    intent: Intent,
    result: &SearchResult,
    applied: &AppliedContext,
    notices: &[Notice],
) -> String {
    if notices
        .iter()
        .any(|n| matches!(n, Notice::SearchUnavailable { .. }))
    {
        return "Search is temporarily unavailable, so I couldn't fetch products right now. \
                Please try again shortly."
            .to_owned();
    }
    if result.is_empty() {
        return "I couldn't find any products matching your request.".to_owned();
    }

    let n = result.len();
    let mut message = match intent {
        Intent::Comparison => format!("Here are {n} products to compare."),
        Intent::Styling => format!("Here are {n} pieces to build your outfit."),
        _ => format!("Found {n} products matching your search."),
    };
    if let Some(dropped) = &result.relaxed {
        message.push_str(&format!(
            " Nothing matched every filter, so I relaxed \"{dropped}\"."
        ));
    }
    describe_personalization(&mut message, applied);
    message
}

pub(crate) fn outfit(
    plan: &OutfitPlan,
    pieces: &[OutfitPiece],
    applied: &AppliedContext,
    notices: &[Notice],
) -> String {
    if pieces.is_empty() {
        if notices
            .iter()
            .any(|n| matches!(n, Notice::SearchUnavailable { .. }))
        {
            return "Search is temporarily unavailable, so I couldn't put an outfit together \
                    right now. Please try again shortly."
                .to_owned();
        }
        return "I couldn't put together an outfit from the catalog for that request.".to_owned();
    }

    let intro = match (plan.activity, plan.weather) {
        (Some(activity), Some(weather)) => format!("For {activity} in {weather} weather"),
        (Some(activity), None) => format!("For {activity}"),
        (None, Some(weather)) => format!("For {weather} weather"),
        (None, None) => "For your outfit".to_owned(),
    };
    let items: usize = pieces.iter().map(|p| p.result.len()).sum();
    let categories: Vec<&str> = pieces.iter().map(|p| p.category.as_str()).collect();
    let mut message = format!(
        "{intro}, I've found {items} items across {} categories: {}.",
        categories.len(),
        categories.join(", ")
    );
    let missing: Vec<&str> = plan
        .categories()
        .into_iter()
        .filter(|(category, required)| *required && !categories.contains(category))
        .map(|(category, _)| category)
        .collect();
    if !missing.is_empty() {
        message.push_str(&format!(" Nothing matched for {}.", missing.join(", ")));
    }
    describe_personalization(&mut message, applied);
    message
}

fn describe_personalization(message: &mut String, applied: &AppliedContext) {
    if applied.is_personalized() {
        let mut parts: Vec<String> = applied.lexical_terms.clone();
        parts.extend(applied.constraints.iter().map(ToString::to_string));
        message.push_str(&format!(" Personalized with: {}.", parts.join(", ")));
    }
}

pub(crate) fn similar(name: &str, result: &SearchResult, notices: &[Notice]) -> String {
    if notices
        .iter()
        .any(|n| matches!(n, Notice::SearchUnavailable { .. }))
    {
        return "Search is temporarily unavailable. Please try again shortly.".to_owned();
    }
    match result.len() {
        0 => format!("I couldn't find anything similar to {name}."),
        n => format!("Here are {n} products similar to {name}."),
    }
}

pub(crate) fn catalog(summary: &CatalogSummary) -> String {
    if summary.total_products == 0 {
        return "The catalog is empty.".to_owned();
    }
    let brands: Vec<&str> = summary.brands.keys().map(String::as_str).collect();
    let categories: Vec<&str> = summary.categories.keys().map(String::as_str).collect();
    let mut message = format!(
        "Our catalog has {} products from {} brands ({}) across {}.",
        summary.total_products,
        brands.len(),
        brands.join(", "),
        categories.join(", "),
    );
    if let Some(price) = summary.price {
        message.push_str(&format!(
            " Prices run from ${:.0} to ${:.0}.",
            price.min, price.max
        ));
    }
    message
}

pub(crate) fn feedback(signals: &[FeedbackSignal]) -> String {
    if signals.is_empty() {
        return "Feedback noted!".to_owned();
    }
    let actions: Vec<String> = signals.iter().map(action).collect();
    format!("Thanks for the feedback! {}", actions.join(" "))
}

fn action(signal: &FeedbackSignal) -> String {
    let value = signal.value.as_deref().unwrap_or_default();
    match (signal.kind, signal.direction) {
        (SignalKind::Budget, Direction::Lower) => {
            "I'll focus on more affordable options.".to_owned()
        }
        (SignalKind::Budget, _) => "I'll include some higher-end options.".to_owned(),
        (SignalKind::Color, Direction::Avoid) if value == "bright" => {
            "I'll recommend more neutral colors.".to_owned()
        }
        (SignalKind::Color, Direction::Avoid) => format!("I'll steer away from {value}."),
        (SignalKind::Color, _) if value == "colorful" => {
            "I'll show you more colorful options.".to_owned()
        }
        (SignalKind::Color, _) => format!("I'll favor {value}."),
        (SignalKind::Fit, Direction::Raise) => "I'll suggest more relaxed fits.".to_owned(),
        (SignalKind::Fit, _) => "I'll suggest slimmer fits.".to_owned(),
        (SignalKind::Brand, Direction::Avoid) => format!("I'll leave out {value}."),
        (SignalKind::Brand, _) => format!("Noted that you like {value}."),
    }
}

pub(crate) fn preferences_saved(permanent: bool) -> String {
    if permanent {
        "Preferences saved.".to_owned()
    } else {
        "Preferences applied for this session only.".to_owned()
    }
}

pub(crate) fn greeting(user_id: &str, summary: &str) -> String {
    format!("Welcome back, {user_id}! Last time: {summary}.")
}

#[cfg(test)]
mod tests {
    use trailfit_retrieval::{Constraint, SearchMode};

    use super::*;

    #[test]
    fn feedback_actions() {
        let signals = vec![
            FeedbackSignal::new(SignalKind::Budget, Direction::Lower, None),
            FeedbackSignal::new(SignalKind::Fit, Direction::Raise, Some("relaxed")),
        ];
        assert_eq!(
            feedback(&signals),
            "Thanks for the feedback! I'll focus on more affordable options. \
             I'll suggest more relaxed fits."
        );
        assert_eq!(feedback(&[]), "Feedback noted!");
    }

    #[test]
    fn unavailable_search_says_so() {
        let result = SearchResult::empty(SearchMode::Semantic, None);
        let notices = vec![Notice::SearchUnavailable {
            reason: "timeout".into(),
        }];
        assert!(search(Intent::ProductSearch, &result, &AppliedContext::default(), &notices)
            .contains("temporarily unavailable"));
    }

    #[test]
    fn empty_result_is_not_an_outage() {
        let result = SearchResult::empty(SearchMode::Hybrid, None);
        assert_eq!(
            search(Intent::ProductSearch, &result, &AppliedContext::default(), &[]),
            "I couldn't find any products matching your request."
        );
    }

    #[test]
    fn outfit_names_its_categories_and_gaps() {
        let plan = OutfitPlan::from_query("what should I wear skiing in the snow");
        let piece = |category: &str, n: usize| OutfitPiece {
            category: category.to_owned(),
            required: true,
            result: SearchResult::new(
                SearchMode::Hybrid,
                (0..n)
                    .map(|i| trailfit_retrieval::ScoredProduct {
                        product: shell(&format!("{category}-{i}")),
                        score: 0.8,
                    })
                    .collect(),
                None,
            ),
        };
        let message = outfit(
            &plan,
            &[piece("Outerwear", 2), piece("Apparel", 1)],
            &AppliedContext::default(),
            &[],
        );
        assert_eq!(
            message,
            "For skiing in snowy weather, I've found 3 items across 2 categories: \
             Outerwear, Apparel. Nothing matched for Footwear."
        );
        assert_eq!(
            outfit(&plan, &[], &AppliedContext::default(), &[]),
            "I couldn't put together an outfit from the catalog for that request."
        );
    }

    #[test]
    fn personalization_is_described() {
        let applied = AppliedContext {
            lexical_terms: vec!["blue".into()],
            constraints: vec![Constraint::MaxPrice { value: 300.0 }],
            ..AppliedContext::default()
        };
        let product = shell("p1");
        let result = SearchResult::new(
            SearchMode::Hybrid,
            vec![trailfit_retrieval::ScoredProduct {
                product,
                score: 0.9,
            }],
            None,
        );
        let message = search(Intent::ProductSearch, &result, &applied, &[]);
        assert!(message.starts_with("Found 1 products"), "{message}");
        assert!(message.contains("Personalized with: blue, price <= 300."), "{message}");
    }

    fn shell(id: &str) -> trailfit_core::Product {
        trailfit_core::Product {
            id: id.into(),
            name: "Shell".into(),
            brand: "NorthPeak".into(),
            category: "Outerwear".into(),
            subcategory: "Shells".into(),
            price: 200.0,
            rating: 4.0,
            gender: "Unisex".into(),
            season: "All-season".into(),
            waterproofing: "Waterproof".into(),
            insulation: "None".into(),
            material: "Nylon".into(),
            color: "Blue".into(),
            purpose: "Hiking".into(),
            terrain: "Mountain".into(),
            description: String::new(),
        }
    }
}
