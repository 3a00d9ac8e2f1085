//! services/api/src/web/page.rs
//!
//! Server-rendered HTML pages: the topic form with the history table, and the
//! detail view of a generated lesson. A small script listens on `/ws` and
//! reloads the page whenever a record changes.

use crate::web::state::{AppState, SessionId};
use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use lesson_gen_core::{
    domain::{GeneratedLessonRecord, Lesson, LessonStatus},
    tracker::{Notification, NotificationVariant, TopicInput},
};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const EXAMPLE_TOPICS: [&str; 3] = [
    "A one-pager on how to divide with long division",
    "An explanation of how the Cartesian Grid works and an example of finding distances between points",
    "A test on counting numbers",
];

const STYLE: &str = r#"body{font-family:system-ui,sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem;color:#1f2937}
form{display:flex;gap:.5rem}input[type=text]{flex-grow:1;padding:.5rem;font-size:1rem}
button{padding:.5rem 1rem}table{width:100%;border-collapse:collapse;margin-top:1rem}
td,th{border-bottom:1px solid #e5e7eb;padding:.5rem;text-align:left}
.badge{border-radius:9999px;padding:.1rem .6rem;font-size:.8rem}
.pending{background:#e5e7eb}.generated{background:#2563eb;color:#fff}.failed{background:#dc2626;color:#fff}
.toast{border:1px solid #dc2626;border-radius:.375rem;padding:.5rem 1rem;margin-bottom:1rem}
.box{background:#f3f4f6;border:1px solid #e5e7eb;border-radius:.375rem;padding:1rem;margin:1rem 0;white-space:pre-wrap}
details{border-bottom:1px solid #e5e7eb;padding:.5rem 0}summary{font-weight:600;cursor:pointer}"#;

/// Reloads once when the history changes. `RENDERED` is the history this page
/// was rendered from, so a snapshot that already matches it is ignored.
const LIVE_RELOAD: &str = r#"<script>
let reloading = false;
const reload = () => { if (!reloading) { reloading = true; location.reload(); } };
const ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
ws.onmessage = (e) => {
  const msg = JSON.parse(e.data);
  if (msg.type === "history") {
    if (msg.records.map((r) => r.id + ":" + r.status).join(",") !== RENDERED) reload();
  } else if (msg.type !== "error") {
    reload();
  }
};
</script>"#;

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape_html(title),
        STYLE,
        body
    )
}

//=========================================================================================
// Rendering
//=========================================================================================

/// `id:status` pairs, newest first, in the form the reload script compares against.
pub fn history_signature(records: &[GeneratedLessonRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}:{}", r.id, r.status()))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn render_index(
    records: &[GeneratedLessonRecord],
    notifications: &[Notification],
    input: &TopicInput,
) -> String {
    let mut body = String::new();
    body.push_str("<h1>LessonGen</h1><p>Enter any topic and let AI create a comprehensive lesson for you.</p>");

    for n in notifications {
        let _ = write!(
            body,
            "<div class=\"toast {}\" role=\"alert\"><strong>{}</strong><br>{}</div>",
            match n.variant {
                NotificationVariant::Destructive => "destructive",
            },
            escape_html(&n.title),
            escape_html(&n.description)
        );
    }

    let _ = write!(
        body,
        "<form method=\"post\" action=\"/lessons\">\
         <input type=\"text\" name=\"topic\" value=\"{}\" placeholder=\"e.g., 'The basics of Quantum Physics'\" \
         oninput=\"this.form.querySelector('button').disabled = !this.value.trim()\">\
         <button type=\"submit\"{}>Generate Lesson</button></form>",
        escape_html(input.value()),
        if input.is_blank() { " disabled" } else { "" }
    );

    body.push_str("<p><strong>Lesson Outline Examples:</strong></p><ul>");
    for example in EXAMPLE_TOPICS {
        let _ = write!(body, "<li>{}</li>", escape_html(example));
    }
    body.push_str("</ul>");

    if !records.is_empty() {
        body.push_str("<h2>History</h2><table><thead><tr><th>Name</th><th>Status</th><th>View</th></tr></thead><tbody>");
        for record in records {
            let status = record.status();
            let view = match status {
                LessonStatus::Generated => format!("<a href=\"/lessons/{}\">View</a>", record.id),
                LessonStatus::Pending => "<span aria-label=\"generating\">&hellip;</span>".to_string(),
                LessonStatus::Failed => String::new(),
            };
            let _ = write!(
                body,
                "<tr><td>{}</td><td><span class=\"badge {}\">{}</span></td><td>{}</td></tr>",
                escape_html(&record.topic),
                status,
                status,
                view
            );
        }
        body.push_str("</tbody></table>");
    }

    let _ = write!(
        body,
        "<script>const RENDERED = \"{}\";</script>{}",
        history_signature(records),
        LIVE_RELOAD
    );
    layout("LessonGen", &body)
}

pub fn render_lesson(lesson: &Lesson) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<p><a href=\"/\">&larr; Back</a></p><h1>{}</h1><div class=\"box\"><h3>Introduction</h3>{}</div>",
        escape_html(&lesson.title),
        escape_html(&lesson.introduction)
    );
    for (i, section) in lesson.sections.iter().enumerate() {
        let _ = write!(
            body,
            "<details{}><summary>{}</summary><div class=\"box\">{}</div></details>",
            if i == 0 { " open" } else { "" },
            escape_html(&section.title),
            escape_html(&section.content)
        );
    }
    let _ = write!(
        body,
        "<div class=\"box\"><h3>Summary</h3>{}</div>",
        escape_html(&lesson.summary)
    );
    layout(&lesson.title, &body)
}

//=========================================================================================
// Handlers
//=========================================================================================

#[derive(Deserialize)]
pub struct TopicForm {
    pub topic: String,
}

/// GET / - The topic form, notifications and history.
pub async fn index_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    let (records, notifications) = match app_state.find_tracker(session).await {
        Some(tracker) => (tracker.history().await, tracker.take_notifications().await),
        None => (Vec::new(), Vec::new()),
    };
    Html(render_index(&records, &notifications, &TopicInput::default()))
}

/// POST /lessons - Submits the form's topic.
///
/// An accepted topic redirects to the history with a cleared form. A rejected
/// one re-renders the page with the notification and the typed value kept.
pub async fn submit_form_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Form(form): Form<TopicForm>,
) -> Response {
    let tracker = app_state.tracker_for(session).await;
    let mut input = TopicInput::new(form.topic);
    match input.submit(&tracker).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            debug!(error = %e, "Form submission rejected");
            let records = tracker.history().await;
            let notifications = tracker.take_notifications().await;
            (
                StatusCode::BAD_REQUEST,
                Html(render_index(&records, &notifications, &input)),
            )
                .into_response()
        }
    }
}

/// GET /lessons/{id} - Detail view of a generated lesson.
pub async fn lesson_view_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<Uuid>,
) -> Response {
    let record = match app_state.find_tracker(session).await {
        Some(tracker) => tracker.get(id).await,
        None => None,
    };
    match record.as_ref().and_then(|r| r.lesson()) {
        Some(lesson) => Html(render_lesson(lesson)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html(layout(
                "Not found",
                "<p>Lesson not found.</p><p><a href=\"/\">&larr; Back</a></p>",
            )),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_gen_core::domain::LessonSection;

    fn lesson() -> Lesson {
        Lesson {
            title: "Fractions".to_string(),
            introduction: "Parts of <a> whole".to_string(),
            sections: vec![
                LessonSection {
                    title: "Halves".to_string(),
                    content: "1/2".to_string(),
                },
                LessonSection {
                    title: "Thirds".to_string(),
                    content: "1/3".to_string(),
                },
            ],
            summary: "Done & dusted".to_string(),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>"x" & 'y'</script>"#),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn index_lists_history_in_order_with_view_links() {
        let mut done = GeneratedLessonRecord::pending("Fractions");
        done.mark_generated(lesson());
        let pending = GeneratedLessonRecord::pending("<b>Tides</b>");
        let mut failed = GeneratedLessonRecord::pending("Volcanoes");
        failed.mark_failed();
        let html = render_index(
            &[pending.clone(), done.clone(), failed],
            &[Notification::missing_topic()],
            &TopicInput::default(),
        );

        let tides = html.find("&lt;b&gt;Tides&lt;/b&gt;").unwrap();
        let fractions = html.find("Fractions").unwrap();
        let volcanoes = html.find("Volcanoes").unwrap();
        assert!(tides < fractions && fractions < volcanoes);
        assert!(html.contains(&format!("/lessons/{}", done.id)));
        assert!(!html.contains(&format!("/lessons/{}", pending.id)));
        assert!(html.contains("Please enter a topic."));
    }

    #[test]
    fn index_hides_history_when_empty() {
        let html = render_index(&[], &[], &TopicInput::default());
        assert!(!html.contains("History"));
        assert!(html.contains("<button type=\"submit\" disabled>Generate Lesson"));
        assert!(html.contains("const RENDERED = \"\";"));
    }

    #[test]
    fn index_embeds_the_rendered_history() {
        let mut done = GeneratedLessonRecord::pending("Fractions");
        done.mark_generated(lesson());
        let pending = GeneratedLessonRecord::pending("Tides");
        let records = [pending.clone(), done.clone()];

        let html = render_index(&records, &[], &TopicInput::default());
        let signature = format!("{}:pending,{}:generated", pending.id, done.id);
        assert_eq!(history_signature(&records), signature);
        assert!(html.contains(&format!("const RENDERED = \"{}\";", signature)));
    }

    #[test]
    fn index_keeps_a_rejected_topic_in_the_form() {
        let html = render_index(&[], &[], &TopicInput::new("   "));
        assert!(html.contains("value=\"   \""));
        assert!(html.contains("<button type=\"submit\" disabled>Generate Lesson"));

        let html = render_index(&[], &[], &TopicInput::new("<b>Tides</b>"));
        assert!(html.contains("value=\"&lt;b&gt;Tides&lt;/b&gt;\""));
        assert!(html.contains("<button type=\"submit\">Generate Lesson"));
    }

    #[test]
    fn lesson_view_renders_sections_in_order() {
        let html = render_lesson(&lesson());
        let halves = html.find("Halves").unwrap();
        let thirds = html.find("Thirds").unwrap();
        assert!(halves < thirds);
        assert!(html.contains("Parts of &lt;a&gt; whole"));
        assert!(html.contains("Done &amp; dusted"));
        assert!(html.contains("<details open><summary>Halves"));
    }
}
