use crate::models::prompt::{CategoryDef, PromptDef, SubCategoryDef};

fn sub(id: &str, name: &str, prompts: &[&str]) -> SubCategoryDef {
    SubCategoryDef {
        id: id.into(),
        name: name.into(),
        prompts: prompts
            .iter()
            .enumerate()
            .map(|(i, content)| PromptDef {
                name: format!("{} #{}", name, i + 1),
                content: (*content).into(),
            })
            .collect(),
    }
}

/// Catalog used when the host does not configure one.
pub fn builtin_catalog() -> Vec<CategoryDef> {
    vec![
        CategoryDef {
            id: "datasource_queries".into(),
            name: "Datasource Queries".into(),
            sub_categories: vec![
                sub(
                    "metrics_promql",
                    "Metrics (PromQL)",
                    &[
                        "Show me the rate of HTTP requests per second for the last 5 minutes",
                        "Calculate the 95th percentile of request duration by handler",
                        "List all pods that are currently in a CrashLoopBackOff state",
                    ],
                ),
                sub(
                    "logs_logql",
                    "Logs (LogQL)",
                    &[
                        "Find all error logs for the 'auth-service' in the last hour",
                        "Count the number of log lines per level for the 'payment-gateway' app",
                        "Extract the 'latency' field from logs and calculate the average",
                    ],
                ),
                sub(
                    "traces_traceql",
                    "Traces (TraceQL)",
                    &[
                        "Find traces where the total duration is greater than 2 seconds",
                        "Show traces that contain a span with error=true",
                        "Find traces involving both 'frontend' and 'database' services",
                    ],
                ),
            ],
        },
        CategoryDef {
            id: "dashboards".into(),
            name: "Dashboards".into(),
            sub_categories: vec![
                sub(
                    "create",
                    "Create",
                    &[
                        "Create a dashboard for monitoring Kubernetes cluster health",
                        "Generate a dashboard for visualizing RED metrics (Rate, Errors, Duration)",
                        "Build a dashboard to track business KPIs like active users and revenue",
                    ],
                ),
                sub(
                    "update",
                    "Update",
                    &[
                        "Add a variable to filter this dashboard by 'namespace'",
                        "Change the visualization type of the 'Memory Usage' panel to a gauge",
                        "Update the time range of all panels to default to 'Last 24 hours'",
                    ],
                ),
                sub(
                    "organize",
                    "Organize",
                    &[
                        "Group related panels into a row called 'Database Metrics'",
                        "Sort the panels by importance, putting critical metrics at the top",
                        "Add a text panel with instructions on how to interpret these metrics",
                    ],
                ),
            ],
        },
        CategoryDef {
            id: "alerts".into(),
            name: "Alerts".into(),
            sub_categories: vec![
                sub(
                    "metric_promql",
                    "Metric Alerts (PromQL)",
                    &[
                        "Alert when CPU usage exceeds 80% for more than 5 minutes",
                        "Create an alert for high error rate (> 1%) on the ingress controller",
                        "Notify when disk space is less than 10% free",
                    ],
                ),
                sub(
                    "logs_logql",
                    "Log Alerts (LogQL)",
                    &[
                        "Alert when more than 10 'Connection refused' errors occur in 1 minute",
                        "Trigger an alert if a specific security exception is logged",
                        "Alert on any log line containing 'PANIC' or 'FATAL'",
                    ],
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::validation::validate_catalog;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = builtin_catalog();
        validate_catalog(&catalog).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[1].sub_categories.len(), 3);
    }
}
