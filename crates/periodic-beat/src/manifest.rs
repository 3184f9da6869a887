use periodic_core::{CrontabManifest, TaskManifest};
use periodic_registry::{
    CronField, CrontabFields, Result, TaskDefinition, TaskOptions, TaskRegistry,
};

/// Turn one `[[tasks]]` entry into a validated definition.
pub fn to_definition(entry: &TaskManifest) -> Result<TaskDefinition> {
    let mut options = TaskOptions::new()
        .enabled(entry.enabled)
        .args(entry.args.clone())
        .kwargs(entry.kwargs.clone())
        .one_off(entry.one_off);

    if let Some(seconds) = entry.interval {
        options = options.interval_secs(seconds);
    }
    match &entry.crontab {
        Some(CrontabManifest::Expression(expr)) => options = options.crontab(expr.as_str()),
        Some(CrontabManifest::Fields {
            minute,
            hour,
            day_of_month,
            month_of_year,
            day_of_week,
        }) => {
            let mut fields = CrontabFields::default();
            for (field, value) in [
                (CronField::Minute, minute),
                (CronField::Hour, hour),
                (CronField::DayOfMonth, day_of_month),
                (CronField::MonthOfYear, month_of_year),
                (CronField::DayOfWeek, day_of_week),
            ] {
                if let Some(value) = value {
                    fields = fields.with(field, value.as_str());
                }
            }
            options = options.crontab_fields(fields);
        }
        None => {}
    }
    if let Some(ref name) = entry.name {
        options = options.name(name.as_str());
    }
    if let Some(ref queue) = entry.queue {
        options = options.queue(queue.as_str());
    }
    if let Some(priority) = entry.priority {
        options = options.priority(priority);
    }
    if let Some(expires) = entry.expires {
        options = options.expires(expires);
    }
    if let Some(start_time) = entry.start_time {
        options = options.start_time(start_time);
    }

    options.into_definition(&entry.task)
}

/// Register every manifest entry, stopping at the first invalid one.
pub fn register_all(registry: &TaskRegistry, entries: &[TaskManifest]) -> anyhow::Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        let definition = to_definition(entry)
            .map_err(|e| anyhow::anyhow!("task #{index} ({}): {e}", entry.task))?;
        registry.register(definition)?;
    }
    Ok(())
}
