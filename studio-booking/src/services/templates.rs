//! Email templates
//!
//! Each message is assembled from a list of [`Block`]s and rendered twice,
//! once as HTML and once as plain text, so the two bodies always carry the
//! same content. All interpolated text is HTML-escaped in the HTML body.

use chrono::{DateTime, FixedOffset, Utc};
use studio_common::calendar::{google_calendar_url, CalendarEvent};
use studio_common::human_time::{
    format_display_date, format_display_datetime, format_display_time, human_duration,
};
use studio_common::models::{ConsultationDetails, EmailType};

/// Subject and paired bodies of one rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Staff-facing notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEvent {
    Booked,
    Rescheduled,
    Cancelled,
}

impl AdminEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminEvent::Booked => "booked",
            AdminEvent::Rescheduled => "rescheduled",
            AdminEvent::Cancelled => "cancelled",
        }
    }
}

/// Everything a template may interpolate
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub details: &'a ConsultationDetails,
    pub studio_name: &'a str,
    pub site_url: &'a str,
    /// IANA zone handed to Google Calendar
    pub timezone: &'a str,
    /// Offset used for displayed dates and times
    pub offset: FixedOffset,
    /// Start time before a reschedule
    pub previous_start: Option<DateTime<Utc>>,
}

impl TemplateContext<'_> {
    fn first_name(&self) -> &str {
        let name = self.details.client.first_name.trim();
        if name.is_empty() {
            "there"
        } else {
            name
        }
    }

    fn date(&self) -> String {
        format_display_date(&self.details.consultation.start_at, &self.offset)
    }

    fn time(&self) -> String {
        format_display_time(&self.details.consultation.start_at, &self.offset)
    }

    fn datetime(&self) -> String {
        format_display_datetime(&self.details.consultation.start_at, &self.offset)
    }

    fn calendar_url(&self) -> String {
        let event = CalendarEvent::for_consultation(&self.details.consultation, self.studio_name);
        google_calendar_url(&event, self.timezone)
    }

    fn booking_url(&self) -> String {
        format!("{}/consultations", self.site_url)
    }
}

/// Building block shared by both renderings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    Heading(String),
    List(Vec<String>),
    Details(Vec<(String, String)>),
    Button { label: String, url: String },
}

/// Escape text for inclusion in HTML element content or attribute values
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn render_html(studio_name: &str, blocks: &[Block]) -> String {
    let mut body = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(text) => {
                let escaped = html_escape(text).replace('\n', "<br>");
                body.push_str(&format!("<p style=\"margin:0 0 16px\">{}</p>\n", escaped));
            }
            Block::Heading(text) => {
                body.push_str(&format!(
                    "<h2 style=\"font-size:18px;margin:24px 0 12px\">{}</h2>\n",
                    html_escape(text)
                ));
            }
            Block::List(items) => {
                body.push_str("<ul style=\"margin:0 0 16px;padding-left:20px\">\n");
                for item in items {
                    body.push_str(&format!("<li>{}</li>\n", html_escape(item)));
                }
                body.push_str("</ul>\n");
            }
            Block::Details(rows) => {
                body.push_str(
                    "<table style=\"border-collapse:collapse;margin:0 0 16px\" cellpadding=\"6\">\n",
                );
                for (label, value) in rows {
                    body.push_str(&format!(
                        "<tr><td style=\"color:#666\">{}</td><td><strong>{}</strong></td></tr>\n",
                        html_escape(label),
                        html_escape(value)
                    ));
                }
                body.push_str("</table>\n");
            }
            Block::Button { label, url } => {
                body.push_str(&format!(
                    "<p style=\"margin:0 0 16px\"><a href=\"{}\" style=\"display:inline-block;padding:10px 18px;background:#111;color:#fff;text-decoration:none;border-radius:4px\">{}</a></p>\n",
                    html_escape(url),
                    html_escape(label)
                ));
            }
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<body style=\"font-family:Helvetica,Arial,sans-serif;color:#111;line-height:1.5\">\n\
         <div style=\"max-width:560px;margin:0 auto;padding:24px\">\n\
         <h1 style=\"font-size:20px;margin:0 0 24px\">{}</h1>\n{}</div>\n</body>\n</html>\n",
        html_escape(studio_name),
        body
    )
}

fn render_text(studio_name: &str, blocks: &[Block]) -> String {
    let mut sections = vec![studio_name.to_string()];
    for block in blocks {
        let section = match block {
            Block::Paragraph(text) => text.clone(),
            Block::Heading(text) => format!("{}\n{}", text, "-".repeat(text.chars().count())),
            Block::List(items) => items
                .iter()
                .map(|item| format!("- {}", item))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Details(rows) => rows
                .iter()
                .map(|(label, value)| format!("{}: {}", label, value))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Button { label, url } => format!("{}: {}", label, url),
        };
        sections.push(section);
    }
    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}

fn rendered(ctx: &TemplateContext<'_>, subject: String, blocks: Vec<Block>) -> RenderedEmail {
    RenderedEmail {
        subject,
        html: render_html(ctx.studio_name, &blocks),
        text: render_text(ctx.studio_name, &blocks),
    }
}

/// Date, time, duration, package and meeting link rows
fn summary_rows(ctx: &TemplateContext<'_>) -> Vec<(String, String)> {
    let consultation = &ctx.details.consultation;
    let mut rows = vec![
        ("Date".to_string(), ctx.date()),
        ("Time".to_string(), ctx.time()),
        (
            "Duration".to_string(),
            human_duration(consultation.duration_minutes),
        ),
    ];
    if let Some(package) = &consultation.package {
        rows.push(("Package".to_string(), package.name.clone()));
    }
    if let Some(link) = &consultation.meeting_link {
        rows.push(("Meeting link".to_string(), link.clone()));
    }
    rows
}

fn summary_blocks(ctx: &TemplateContext<'_>) -> Vec<Block> {
    let mut blocks = vec![Block::Details(summary_rows(ctx))];
    if let Some(package) = &ctx.details.consultation.package {
        if !package.features.is_empty() {
            blocks.push(Block::Heading("What's included".to_string()));
            blocks.push(Block::List(package.features.clone()));
        }
    }
    blocks
}

fn calendar_button(ctx: &TemplateContext<'_>) -> Block {
    Block::Button {
        label: "Add to Google Calendar".to_string(),
        url: ctx.calendar_url(),
    }
}

fn greeting(ctx: &TemplateContext<'_>) -> Block {
    Block::Paragraph(format!("Hi {},", ctx.first_name()))
}

fn sign_off(ctx: &TemplateContext<'_>) -> Block {
    Block::Paragraph(format!("Talk soon,\n{}", ctx.studio_name))
}

/// Render a client-facing email
pub fn render_client(email_type: EmailType, ctx: &TemplateContext<'_>) -> RenderedEmail {
    match email_type {
        EmailType::Confirmation => confirmation(ctx),
        EmailType::Reminder24h => reminder_24h(ctx),
        EmailType::Reminder1h => reminder_1h(ctx),
        EmailType::Reschedule => reschedule(ctx),
        EmailType::Cancellation => cancellation(ctx),
        EmailType::FollowUp => follow_up(ctx),
    }
}

fn confirmation(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph(format!(
            "Thanks for booking a consultation with {}. Here are the details:",
            ctx.studio_name
        )),
    ];
    blocks.extend(summary_blocks(ctx));
    if let Some(notes) = non_blank(ctx.details.consultation.notes.as_deref()) {
        blocks.push(Block::Heading("Your notes".to_string()));
        blocks.push(Block::Paragraph(notes.to_string()));
    }
    blocks.push(calendar_button(ctx));
    blocks.push(Block::Paragraph(
        "We'll send a reminder the day before and again an hour before we start. \
         If you need to change the time, just reply to this email."
            .to_string(),
    ));
    blocks.push(sign_off(ctx));

    rendered(
        ctx,
        format!("Consultation confirmed: {} at {}", ctx.date(), ctx.time()),
        blocks,
    )
}

fn reminder_24h(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph("Just a reminder that your consultation is tomorrow.".to_string()),
    ];
    blocks.extend(summary_blocks(ctx));
    blocks.push(calendar_button(ctx));
    blocks.push(Block::Paragraph(
        "Have your project files, reference tracks and questions ready so we can make the most of the session."
            .to_string(),
    ));
    blocks.push(sign_off(ctx));

    rendered(
        ctx,
        format!("Reminder: your consultation is tomorrow at {}", ctx.time()),
        blocks,
    )
}

fn reminder_1h(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph("Your consultation starts in about an hour.".to_string()),
        Block::Details(summary_rows(ctx)),
        Block::Heading("Last-minute checklist".to_string()),
        Block::List(vec![
            "Test your microphone and headphones".to_string(),
            "Open the project files or bounces you want to discuss".to_string(),
            "Find a quiet spot with a stable internet connection".to_string(),
            "Jot down the questions you want answered".to_string(),
        ]),
    ];
    match &ctx.details.consultation.meeting_link {
        Some(link) => blocks.push(Block::Button {
            label: "Join meeting".to_string(),
            url: link.clone(),
        }),
        None => blocks.push(Block::Paragraph(
            "We'll send the meeting link shortly before we start.".to_string(),
        )),
    }
    blocks.push(sign_off(ctx));

    rendered(
        ctx,
        format!("Starting soon: your consultation at {}", ctx.time()),
        blocks,
    )
}

fn reschedule(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph("Your consultation has been moved to a new time.".to_string()),
    ];
    if let Some(previous) = ctx.previous_start {
        blocks.push(Block::Paragraph(format!(
            "Previously: {}",
            format_display_datetime(&previous, &ctx.offset)
        )));
    }
    blocks.push(Block::Paragraph(format!("New time: {}", ctx.datetime())));
    blocks.extend(summary_blocks(ctx));
    blocks.push(calendar_button(ctx));
    blocks.push(sign_off(ctx));

    rendered(
        ctx,
        format!("Consultation rescheduled to {} at {}", ctx.date(), ctx.time()),
        blocks,
    )
}

fn cancellation(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph(format!(
            "Your consultation on {} has been cancelled.",
            ctx.datetime()
        )),
    ];
    if let Some(reason) = non_blank(ctx.details.consultation.cancellation_reason.as_deref()) {
        blocks.push(Block::Paragraph(format!("Reason: {}", reason)));
    }
    blocks.push(Block::Paragraph(
        "We'd still love to work with you. Pick a new time whenever suits you.".to_string(),
    ));
    blocks.push(Block::Button {
        label: "Book a new time".to_string(),
        url: ctx.booking_url(),
    });
    blocks.push(sign_off(ctx));

    rendered(ctx, format!("Consultation cancelled: {}", ctx.date()), blocks)
}

fn follow_up(ctx: &TemplateContext<'_>) -> RenderedEmail {
    let mut blocks = vec![
        greeting(ctx),
        Block::Paragraph(format!(
            "Thank you for your consultation with {}. It was great hearing about your project.",
            ctx.studio_name
        )),
    ];
    if let Some(package) = &ctx.details.consultation.package {
        blocks.push(Block::Paragraph(format!("Session: {}", package.name)));
    }
    blocks.push(Block::Heading("Next steps".to_string()));
    blocks.push(Block::List(vec![
        "Review the notes and action items from our session".to_string(),
        "Send over updated mixes or stems whenever you want another pair of ears".to_string(),
        "Book a follow-up session when you're ready for the next stage".to_string(),
    ]));
    blocks.push(Block::Button {
        label: "Book another session".to_string(),
        url: ctx.booking_url(),
    });
    blocks.push(sign_off(ctx));

    rendered(
        ctx,
        format!("Thanks for your consultation, {}", ctx.first_name()),
        blocks,
    )
}

/// Render a staff notification
pub fn render_admin(event: AdminEvent, ctx: &TemplateContext<'_>) -> RenderedEmail {
    let client = &ctx.details.client;
    let consultation = &ctx.details.consultation;
    let name = client.full_name();

    let (subject, intro) = match event {
        AdminEvent::Booked => (
            format!("New consultation booked: {} on {}", name, ctx.datetime()),
            "A new consultation was booked.".to_string(),
        ),
        AdminEvent::Rescheduled => (
            format!("Consultation rescheduled: {} now {}", name, ctx.datetime()),
            "A consultation was moved to a new time.".to_string(),
        ),
        AdminEvent::Cancelled => (
            format!("Consultation cancelled: {} on {}", name, ctx.datetime()),
            "A consultation was cancelled.".to_string(),
        ),
    };

    let mut rows = vec![
        ("Client".to_string(), name.clone()),
        ("Email".to_string(), client.email.clone()),
    ];
    let optional = [
        ("Phone", &client.phone),
        ("Company", &client.company),
        ("Budget", &client.budget_range),
        ("Timeline", &client.timeline),
        ("Referral", &client.referral_source),
    ];
    for (label, value) in optional {
        if let Some(value) = non_blank(value.as_deref()) {
            rows.push((label.to_string(), value.to_string()));
        }
    }
    rows.extend(summary_rows(ctx));
    rows.push(("Status".to_string(), consultation.status.to_string()));
    rows.push(("Consultation ID".to_string(), consultation.id.clone()));

    let mut blocks = vec![Block::Paragraph(intro), Block::Details(rows)];

    if event == AdminEvent::Rescheduled {
        if let Some(previous) = ctx.previous_start {
            blocks.push(Block::Paragraph(format!(
                "Previously: {}",
                format_display_datetime(&previous, &ctx.offset)
            )));
        }
    }
    if event == AdminEvent::Cancelled {
        if let Some(reason) = non_blank(consultation.cancellation_reason.as_deref()) {
            blocks.push(Block::Paragraph(format!("Reason: {}", reason)));
        }
    }
    if let Some(details) = non_blank(client.project_details.as_deref()) {
        blocks.push(Block::Heading("Project details".to_string()));
        blocks.push(Block::Paragraph(details.to_string()));
    }
    if let Some(notes) = non_blank(consultation.notes.as_deref()) {
        blocks.push(Block::Heading("Client notes".to_string()));
        blocks.push(Block::Paragraph(notes.to_string()));
    }

    rendered(ctx, subject, blocks)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
