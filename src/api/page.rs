use crate::db::{ScheduleRow, UserRow};
use crate::identity::IdentityMode;
use crate::schedule::PERIOD_LABELS;
use chrono::NaiveDate;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl NoticeKind {
    fn class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }
}

pub struct PageView<'a> {
    pub today: NaiveDate,
    pub identity_mode: IdentityMode,
    pub session_user: Option<&'a UserRow>,
    pub schedules: &'a [(UserRow, ScheduleRow)],
    pub notices: &'a [Notice],
}

pub fn render(view: &PageView<'_>) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "<h1>Schedule Checker</h1>");
    let _ = writeln!(body, r#"<p class="today">{}</p>"#, view.today.format("%Y-%m-%d (%A)"));

    for notice in view.notices {
        let _ = writeln!(
            body,
            r#"<div class="notice {}">{}</div>"#,
            notice.kind.class(),
            escape_html(&notice.message)
        );
    }

    if view.identity_mode == IdentityMode::Login {
        match view.session_user {
            Some(user) => {
                let _ = writeln!(
                    body,
                    r#"<form class="auth" method="post" action="/logout"><span>Logged in as <strong>{}</strong></span> <button type="submit">Logout</button></form>"#,
                    escape_html(&user.username)
                );
            }
            None => body.push_str(AUTH_FORM),
        }
    }

    body.push_str(r#"<div class="columns">"#);
    for (user, schedule) in view.schedules {
        render_column(&mut body, user, schedule);
    }
    body.push_str("</div>\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Schedule Checker</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
{body}</body>
</html>
"#
    )
}

fn render_column(body: &mut String, user: &UserRow, schedule: &ScheduleRow) {
    let username = escape_html(&user.username);

    let _ = writeln!(body, r#"<section class="column">"#);
    let _ = writeln!(body, "<h2>{username} schedule</h2>");
    let _ = writeln!(
        body,
        r#"<form method="post" action="/schedule/{}">"#,
        user.id
    );

    for (index, (label, checked)) in PERIOD_LABELS
        .iter()
        .zip(schedule.periods.as_array())
        .enumerate()
    {
        let _ = writeln!(
            body,
            r#"<label><input type="checkbox" name="period{}" onchange="this.form.submit()"{}> {label}</label>"#,
            index + 1,
            if checked { " checked" } else { "" }
        );
    }

    let _ = writeln!(body, r#"<noscript><button type="submit">Save</button></noscript>"#);
    let _ = writeln!(body, "</form>");
    let _ = writeln!(body, "</section>");
}

const AUTH_FORM: &str = r#"<form class="auth" method="post" action="/login">
<input type="text" name="username" placeholder="Username" autocomplete="username">
<input type="password" name="password" placeholder="Password" autocomplete="current-password">
<button type="submit">Login</button>
<button type="submit" formaction="/register">Sign Up</button>
</form>
"#;

pub fn escape_html(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, ch| {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
        out
    })
}
