// Query text construction and match presentation helpers

use crate::models::{QueryForm, Resource};

/// Build free-text query input from the guided-flow form fields.
///
/// Whatever fields are present get concatenated, space-separated, in a
/// fixed order; empty forms produce an empty string (rejected later by
/// the orchestrator's validation).
pub fn build_search_query(form: &QueryForm) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(age) = &form.child_age {
        if !age.trim().is_empty() {
            parts.push(format!("child age {}", age.trim()));
        }
    }
    push_joined(&mut parts, &form.disability_types);
    push_joined(&mut parts, &form.therapy_types);
    if let Some(school_type) = &form.school_type {
        if !school_type.trim().is_empty() {
            parts.push(school_type.trim().to_string());
        }
    }
    push_joined(&mut parts, &form.activity_types);
    push_joined(&mut parts, &form.interests);
    if let Some(location) = &form.location {
        if !location.trim().is_empty() {
            parts.push(location.trim().to_string());
        }
    }
    push_joined(&mut parts, &form.support_needs);
    push_joined(&mut parts, &form.language_preference);

    parts.join(" ")
}

fn push_joined(parts: &mut Vec<String>, values: &[String]) {
    if !values.is_empty() {
        parts.push(values.join(" "));
    }
}

/// Similarity score as a whole-number percentage
pub fn match_percentage(similarity: f32) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Human-readable explanation of why a result matched
pub fn match_reasoning(resource: &Resource, query: &str, similarity: f32) -> String {
    let percentage = match_percentage(similarity);
    let query_lower = query.to_lowercase();

    let mut reasons: Vec<String> = Vec::new();

    let location = resource.location();
    if !location.is_empty() && query_lower.contains(&location.to_lowercase()) {
        reasons.push(format!("is located in your preferred area ({})", location));
    }

    match resource {
        Resource::HealthSpecialist(r) => {
            if let Some(specialty) = &r.specialty {
                if query_lower.contains(&specialty.to_lowercase()) {
                    reasons.push(format!("specializes in {}", specialty));
                }
            }
        }
        Resource::School(r) => {
            if let Some(school_type) = &r.school_type {
                if query_lower.contains(&school_type.to_lowercase()) {
                    reasons.push(format!("is a {} school", school_type));
                }
            }
        }
        Resource::OutdoorClub(_) => {}
    }

    if percentage > 80 {
        reasons.push("is an excellent match for your requirements".to_string());
    } else if percentage > 60 {
        reasons.push("is a good match for your needs".to_string());
    } else {
        reasons.push("is a suitable option based on your criteria".to_string());
    }

    format!(
        "This is a {}% match because it {}.",
        percentage,
        reasons.join(", ")
    )
}
