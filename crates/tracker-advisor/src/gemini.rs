use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use tracker_core::advisor::{
    Advisor, DetailRequest, DetailSuggestion, PrioritizationPlan, SubtaskIdea, SubtaskRequest,
    TaskDigest, UpdateRequest, UpdateSuggestion, WorkloadInsight, WorkloadStats,
};
use tracker_core::errors::AdvisorError;
use tracker_core::ids::TaskId;
use tracker_core::task::{Priority, TaskStatus};

use crate::extract;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AdvisorConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl AdvisorConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Gemini-backed advisor. Every operation sends one generateContent
/// request and scans the reply for an embedded JSON object; fields the
/// model omitted are backfilled from the request.
pub struct GeminiAdvisor {
    client: Client,
    config: AdvisorConfig,
}

impl GeminiAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            config,
        }
    }

    /// One prompt in, the model's concatenated text out.
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            // Key travels in a header, never in the URL.
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::Network(e.to_string()))?;

        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

#[async_trait]
impl Advisor for GeminiAdvisor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn suggest_details(&self, req: &DetailRequest) -> Result<DetailSuggestion, AdvisorError> {
        let prompt = format!(
            "You are a task management assistant helping users organize their work.\n\
             Based on the following task information, provide a concise, structured response:\n\n\
             Title: {}\n\
             Description: {}\n\
             Due Date: {}\n\n\
             Return a JSON object with this structure:\n\
             {{\n\
               \"priority\": \"LOW\" | \"MEDIUM\" | \"HIGH\" | \"CRITICAL\" based on urgency and importance,\n\
               \"description\": a concise, enhanced description with key action items (max 300 words),\n\
               \"estimated_time\": estimated time to complete in hours,\n\
               \"subtasks\": [3-5 key subtasks, each {{\"title\": \"...\", \"estimated_minutes\": 30}}]\n\
             }}",
            req.title,
            req.description.as_deref().unwrap_or("No description provided"),
            req.due_date,
        );

        let text = self.generate(&prompt).await?;
        let obj = extract::parse_first_object(&text).ok_or(AdvisorError::Unparsable)?;

        Ok(DetailSuggestion {
            priority: parse_priority(&obj["priority"]).unwrap_or(Priority::Medium),
            description: obj["description"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| req.description.clone().unwrap_or_default()),
            estimated_time: obj["estimated_time"].as_f64(),
            subtasks: parse_subtask_ideas(&obj["subtasks"]),
        })
    }

    async fn suggest_update(&self, req: &UpdateRequest) -> Result<UpdateSuggestion, AdvisorError> {
        let prompt = format!(
            "You are a task management assistant helping users update their tasks.\n\
             Based on the following task information, suggest improvements:\n\n\
             Title: {}\n\
             Description: {}\n\
             Current Priority: {}\n\
             Current Status: {}\n\n\
             Return a JSON object with this structure:\n\
             {{\n\
               \"priority\": suggested priority (\"LOW\", \"MEDIUM\", \"HIGH\", or \"CRITICAL\"),\n\
               \"status\": suggested status (\"PENDING\", \"IN_PROGRESS\", \"COMPLETED\", \"ARCHIVED\"),\n\
               \"description\": enhanced description with clear action items if the original is insufficient\n\
             }}",
            req.title, req.description, req.priority, req.status,
        );

        let text = self.generate(&prompt).await?;
        let obj = extract::parse_first_object(&text).ok_or(AdvisorError::Unparsable)?;

        Ok(UpdateSuggestion {
            priority: parse_priority(&obj["priority"]).unwrap_or(req.priority),
            status: parse_status(&obj["status"]).unwrap_or(req.status),
            description: obj["description"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| req.description.clone()),
        })
    }

    async fn prioritize(&self, tasks: &[TaskDigest]) -> Result<PrioritizationPlan, AdvisorError> {
        let listing = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "{}. [{}] {} - Due: {} - Priority: {} - Status: {}",
                    i + 1,
                    t.id,
                    t.title,
                    t.due_date,
                    t.priority,
                    t.status
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are a task prioritization assistant.\n\
             Prioritize the following tasks based on importance, deadlines, and urgency:\n\n\
             {listing}\n\n\
             Return a JSON object listing task ids (the bracketed values) in order of\n\
             recommended priority, most important first:\n\
             {{\n\
               \"prioritized_ids\": [\"task_...\", ...],\n\
               \"reasoning\": \"brief explanation of your prioritization logic\"\n\
             }}"
        );

        let text = self.generate(&prompt).await?;
        let obj = extract::parse_first_object(&text).ok_or(AdvisorError::Unparsable)?;

        let task_ids = obj["prioritized_ids"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str())
                    .map(TaskId::from_raw)
                    .collect()
            })
            .unwrap_or_default();

        Ok(PrioritizationPlan {
            task_ids,
            reasoning: obj["reasoning"]
                .as_str()
                .unwrap_or("Tasks prioritized based on deadlines and importance")
                .to_string(),
        })
    }

    async fn suggest_subtasks(&self, req: &SubtaskRequest) -> Result<Vec<SubtaskIdea>, AdvisorError> {
        let prompt = format!(
            "You are a task management assistant helping users break down their tasks\n\
             into actionable subtasks.\n\
             Based on the following task information, suggest 3-5 specific subtasks:\n\n\
             Title: {}\n\
             Description: {}\n\
             Due Date: {}\n\
             Priority: {}\n\n\
             Return a JSON object:\n\
             {{\n\
               \"subtasks\": [\n\
                 {{\"title\": \"First subtask description\", \"estimated_minutes\": 30}},\n\
                 {{\"title\": \"Second subtask description\", \"estimated_minutes\": 45}}\n\
               ]\n\
             }}",
            req.title, req.description, req.due_date, req.priority,
        );

        let text = self.generate(&prompt).await?;
        let obj = extract::parse_first_object(&text).ok_or(AdvisorError::Unparsable)?;

        Ok(parse_subtask_ideas(&obj["subtasks"]))
    }

    async fn analyze_workload(&self, stats: &WorkloadStats) -> Result<WorkloadInsight, AdvisorError> {
        let stats_json =
            serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string());

        let prompt = format!(
            "You are a workload management assistant analyzing a user's tasks.\n\
             These aggregated statistics describe the upcoming workload:\n\n\
             {stats_json}\n\n\
             Return a JSON object with:\n\
             {{\n\
               \"analysis\": \"brief workload analysis\",\n\
               \"recommendations\": [\"1-3 specific recommendations for better managing tasks\"],\n\
               \"overloaded_dates\": [\"YYYY-MM-DD dates that seem to have too many high-priority tasks\"],\n\
               \"estimated_total_hours\": approximate total hours of work represented\n\
             }}"
        );

        let text = self.generate(&prompt).await?;
        let obj = extract::parse_first_object(&text).ok_or(AdvisorError::Unparsable)?;

        Ok(WorkloadInsight {
            analysis: obj["analysis"]
                .as_str()
                .unwrap_or("Workload analysis completed")
                .to_string(),
            recommendations: string_array(&obj["recommendations"]),
            overloaded_dates: string_array(&obj["overloaded_dates"]),
            estimated_total_hours: obj["estimated_total_hours"].as_f64().unwrap_or(0.0),
        })
    }
}

fn parse_priority(v: &serde_json::Value) -> Option<Priority> {
    v.as_str().and_then(|s| s.parse().ok())
}

fn parse_status(v: &serde_json::Value) -> Option<TaskStatus> {
    v.as_str().and_then(|s| s.parse().ok())
}

fn string_array(v: &serde_json::Value) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Subtask candidates arrive either as objects or bare strings.
fn parse_subtask_ideas(v: &serde_json::Value) -> Vec<SubtaskIdea> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    if let Some(title) = item.as_str() {
                        return Some(SubtaskIdea {
                            title: title.to_string(),
                            estimated_minutes: None,
                        });
                    }
                    item["title"].as_str().map(|title| SubtaskIdea {
                        title: title.to_string(),
                        estimated_minutes: item["estimated_minutes"]
                            .as_u64()
                            .map(|m| m as u32),
                    })
                })
                .filter(|idea| !idea.title.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_subtask_ideas_accepts_objects_and_strings() {
        let v = serde_json::json!([
            {"title": "outline", "estimated_minutes": 30},
            "draft",
            {"title": "review"},
            {"no_title": true},
            ""
        ]);
        let ideas = parse_subtask_ideas(&v);
        assert_eq!(ideas.len(), 3);
        assert_eq!(ideas[0].title, "outline");
        assert_eq!(ideas[0].estimated_minutes, Some(30));
        assert_eq!(ideas[1].title, "draft");
        assert!(ideas[1].estimated_minutes.is_none());
        assert_eq!(ideas[2].title, "review");
    }

    #[test]
    fn parse_subtask_ideas_non_array_is_empty() {
        assert!(parse_subtask_ideas(&serde_json::json!("nope")).is_empty());
        assert!(parse_subtask_ideas(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn parse_priority_rejects_unknown() {
        assert_eq!(parse_priority(&serde_json::json!("HIGH")), Some(Priority::High));
        assert_eq!(parse_priority(&serde_json::json!("URGENT")), None);
        assert_eq!(parse_priority(&serde_json::json!(3)), None);
    }

    #[test]
    fn string_array_filters_non_strings() {
        let v = serde_json::json!(["a", 1, "b", null]);
        assert_eq!(string_array(&v), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn config_defaults() {
        let cfg = AdvisorConfig::new(SecretString::from("key".to_string()));
        assert_eq!(cfg.model, "gemini-2.0-flash");
        assert!(cfg.base_url.contains("generativelanguage"));
    }
}
