//! CSV export: one row per response.
//!
//! Column order: telegram id, result title, question texts in display
//! order, then the lead columns the test actually collects.

use shared_types::{Test, TestResponse};

/// Render responses as CSV with a header row.
pub fn responses_to_csv(test: &Test, responses: &[TestResponse]) -> String {
    let mut header: Vec<String> = vec!["telegram_id".into(), "result_title".into()];
    for question in &test.questions {
        header.push(question.text.clone());
    }
    let lead = &test.lead;
    if lead.lead_collect_name {
        header.push("lead_name".into());
    }
    if lead.lead_collect_phone {
        header.push("lead_phone".into());
    }
    if lead.lead_collect_email {
        header.push("lead_email".into());
    }
    if lead.lead_collect_site {
        header.push("lead_site".into());
        header.push("lead_site_clicked".into());
    }

    let mut out = String::new();
    push_row(&mut out, header.iter().map(String::as_str));

    for response in responses {
        let mut row: Vec<String> = vec![
            response.user_id.to_string(),
            response.result_title.clone().unwrap_or_default(),
        ];
        for question in &test.questions {
            row.push(answer_cell(response, question.id, question.order_num));
        }
        if lead.lead_collect_name {
            row.push(response.lead_name.clone().unwrap_or_default());
        }
        if lead.lead_collect_phone {
            row.push(response.lead_phone.clone().unwrap_or_default());
        }
        if lead.lead_collect_email {
            row.push(response.lead_email.clone().unwrap_or_default());
        }
        if lead.lead_collect_site {
            row.push(response.lead_site.clone().unwrap_or_default());
            row.push(if response.lead_site_clicked { "yes" } else { "no" }.into());
        }
        push_row(&mut out, row.iter().map(String::as_str));
    }
    out
}

/// The answer map is keyed by question id or by order number.
fn answer_cell(response: &TestResponse, question_id: uuid::Uuid, order_num: i64) -> String {
    response
        .answers
        .get(&question_id.to_string())
        .or_else(|| response.answers.get(&order_num.to_string()))
        .cloned()
        .unwrap_or_default()
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&escape(cell));
    }
    out.push_str("\r\n");
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
