//! Alert Message Rendering
//!
//! 異常リストを HTML メール本文に変換する

use crate::analytics::AnomalyRecord;
use serde::{Deserialize, Serialize};

const CELL_STYLE: &str = "padding: 8px;";
const COLUMNS: [&str; 4] = ["Base Station ID", "Anomaly Type", "Timestamp", "Details"];

/// 送信用アラートメッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

impl AlertMessage {
    /// 異常リストからメッセージを組み立てる
    pub fn render(recipient: impl Into<String>, anomalies: &[AnomalyRecord]) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject_line(anomalies.len()),
            html_body: render_table(anomalies),
        }
    }
}

pub fn subject_line(count: usize) -> String {
    format!("[NetGuard AI] Anomaly Alert: {} issues detected", count)
}

fn render_table(anomalies: &[AnomalyRecord]) -> String {
    let mut body = String::from("<h2>NetGuard AI has detected the following anomalies:</h2>");
    body.push_str("<table border='1' style='border-collapse: collapse; width: 100%;'>");

    body.push_str("<tr>");
    for column in COLUMNS {
        body.push_str(&format!("<th style='{}'>{}</th>", CELL_STYLE, column));
    }
    body.push_str("</tr>");

    for anomaly in anomalies {
        let details = if anomaly.details.is_empty() {
            "N/A"
        } else {
            anomaly.details.as_str()
        };
        let cells = [
            anomaly.base_station_id.to_string(),
            anomaly.anomaly_type.to_string(),
            anomaly.timestamp.clone(),
            details.to_string(),
        ];

        body.push_str("<tr>");
        for cell in &cells {
            body.push_str(&format!(
                "<td style='{}'>{}</td>",
                CELL_STYLE,
                ammonia::clean_text(cell)
            ));
        }
        body.push_str("</tr>");
    }

    body.push_str("</table>");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnomalyType, Severity};
    use crate::ingest::StationId;

    fn anomaly(station: StationId, details: &str) -> AnomalyRecord {
        AnomalyRecord {
            base_station_id: station,
            anomaly_type: AnomalyType::TemporalShift,
            timestamp: "2024-01-01T05:00:00".to_string(),
            severity: Severity::High,
            details: details.to_string(),
        }
    }

    #[test]
    fn test_subject_counts_anomalies() {
        let anomalies = vec![
            anomaly(StationId::Numeric(1), "a"),
            anomaly(StationId::Numeric(2), "b"),
        ];
        let message = AlertMessage::render("ops@example.com", &anomalies);
        assert_eq!(message.subject, "[NetGuard AI] Anomaly Alert: 2 issues detected");
        assert_eq!(message.recipient, "ops@example.com");
    }

    #[test]
    fn test_table_layout() {
        let message = AlertMessage::render(
            "ops@example.com",
            &[anomaly(StationId::Numeric(17), "Observed: 9.00")],
        );
        let body = &message.html_body;
        assert!(body.starts_with("<h2>NetGuard AI has detected the following anomalies:</h2>"));
        for column in COLUMNS {
            assert!(body.contains(&format!("<th style='padding: 8px;'>{}</th>", column)));
        }
        assert!(body.contains(">17</td>"));
        assert!(body.contains(&format!(">{}</td>", ammonia::clean_text("Temporal Shift"))));
        assert!(body.ends_with("</table>"));
    }

    #[test]
    fn test_cells_are_escaped() {
        let message = AlertMessage::render(
            "ops@example.com",
            &[anomaly(StationId::Text("<script>".to_string()), "")],
        );
        assert!(!message.html_body.contains("<script>"));
        assert!(message.html_body.contains("&lt;script&gt;"));
        assert!(message.html_body.contains(">N/A</td>"));
    }
}
