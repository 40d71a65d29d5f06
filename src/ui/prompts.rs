use anyhow::Result;
use dialoguer::Select;
use is_terminal::IsTerminal;

/// Interactive confirmation prompt using arrow-key navigable selection
///
/// # Arguments
/// * `prompt` - The question to ask the user
/// * `default_yes` - Whether "Yes" should be the default selection (index 0)
///
/// # Returns
/// * `Ok(true)` if user selects "Yes"
/// * `Ok(false)` if user selects "No"
pub fn prompt_confirmation(prompt: &str, default_yes: bool) -> Result<bool> {
    let items = vec!["Yes", "No"];
    let default_index = if default_yes { 0 } else { 1 };

    let selection = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(selection == 0)
}

/// Ask before writing to the org. Without a terminal the caller must pass `assume_yes`.
pub fn confirm_deploy(components: usize, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("Not running in a terminal; pass --yes to deploy without confirmation");
    }
    prompt_confirmation(
        &format!("Deploy {} component(s) to the org?", components),
        false,
    )
}
