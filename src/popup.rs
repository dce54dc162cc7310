use crate::types::SchoolAttributes;

/// Popup body for one school marker.
///
/// Lines are separated with `<br>` so the renderer can drop the string
/// straight into a popup. The school name is the only free text and is escaped.
pub fn popup_content(school: &SchoolAttributes) -> String {
    let pupils = match school.pupils {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    };
    let rating = match school.rating {
        Some(r) => r.to_string(),
        None => "Not rated".to_string(),
    };
    format!(
        "<b>{}</b><br>URN: {}<br>LAESTAB: {}<br>Phase: {}<br>Ofsted rating: {}<br>Pupils: {}",
        escape(&school.name),
        escape(&school.urn),
        escape(&school.laestab),
        school.phase,
        rating,
        pupils
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OfstedRating, Phase};

    fn school() -> SchoolAttributes {
        SchoolAttributes {
            urn: "100000".to_string(),
            laestab: "2013614".to_string(),
            name: "Sir John Cass's Foundation Primary School".to_string(),
            phase: Phase::Primary,
            rating: Some(OfstedRating::RequiresImprovement),
            pupils: Some(254),
        }
    }

    #[test]
    fn lists_every_field() {
        let popup = popup_content(&school());
        assert_eq!(
            popup,
            "<b>Sir John Cass&#39;s Foundation Primary School</b><br>URN: 100000<br>\
             LAESTAB: 2013614<br>Phase: Primary<br>Ofsted rating: Requires improvement<br>Pupils: 254"
        );
    }

    #[test]
    fn missing_pupil_count_is_reported() {
        let mut s = school();
        s.pupils = None;
        assert!(popup_content(&s).ends_with("Pupils: unknown"));
    }

    #[test]
    fn unrated_school_says_so() {
        let mut s = school();
        s.rating = None;
        assert!(popup_content(&s).contains("Ofsted rating: Not rated"));
    }

    #[test]
    fn markup_in_names_is_escaped() {
        let mut s = school();
        s.name = "<script>A & B</script>".to_string();
        assert!(popup_content(&s).starts_with("<b>&lt;script&gt;A &amp; B&lt;/script&gt;</b>"));
    }

    #[test]
    fn same_input_same_output() {
        assert_eq!(popup_content(&school()), popup_content(&school()));
    }
}
