//! XPath to CSS translation
//!
//! Static drivers answer queries with CSS selectors, so XPath locators are
//! rewritten into an equivalent selector. Only location paths built from
//! element names and simple predicates are supported:
//!
//! - `//div`, `/html/body`, `//*`
//! - `[@attr]`, `[@attr='value']`, `[contains(@attr, 'value')]`
//! - positional `[n]`
//!
//! Anything else (axes, functions other than `contains`, text tests)
//! translates to `None`.

/// Translates an XPath expression into a CSS selector
///
/// # Examples
///
/// ```
/// use rulecrawl::driver::xpath_to_css;
///
/// assert_eq!(xpath_to_css("//div[@id='main']/a").as_deref(), Some(r#"div[id="main"] > a"#));
/// assert_eq!(xpath_to_css("//p[text()='x']"), None);
/// ```
pub fn xpath_to_css(xpath: &str) -> Option<String> {
    let mut rest = xpath.trim();
    if rest.is_empty() {
        return None;
    }

    let mut css = String::new();
    let mut first = true;

    while !rest.is_empty() {
        let combinator = if let Some(stripped) = rest.strip_prefix("//") {
            rest = stripped;
            " "
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
            " > "
        } else if first {
            " "
        } else {
            return None;
        };

        let (step, remaining) = split_step(rest)?;
        let step_css = translate_step(step)?;

        if !first {
            css.push_str(combinator);
        }
        css.push_str(&step_css);

        first = false;
        rest = remaining;
    }

    Some(css)
}

/// Splits off the first location step, honouring brackets and quotes
fn split_step(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (index, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, '/') if depth == 0 => {
                if index == 0 {
                    return None;
                }
                return Some((&input[..index], &input[index..]));
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() || input.is_empty() {
        return None;
    }
    Some((input, ""))
}

fn translate_step(step: &str) -> Option<String> {
    let name_end = step.find('[').unwrap_or(step.len());
    let name = &step[..name_end];

    if name != "*" && !is_identifier(name) {
        return None;
    }

    let mut css = name.to_string();
    let mut rest = &step[name_end..];

    while !rest.is_empty() {
        let inner_end = predicate_end(rest)?;
        let predicate = &rest[1..inner_end];
        css.push_str(&translate_predicate(predicate.trim())?);
        rest = &rest[inner_end + 1..];
    }

    Some(css)
}

/// Index of the `]` closing the predicate that starts at `input[0]`
fn predicate_end(input: &str) -> Option<usize> {
    if !input.starts_with('[') {
        return None;
    }

    let mut quote: Option<char> = None;
    for (index, c) in input.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(index),
            (None, '[') => return None,
            _ => {}
        }
    }
    None
}

fn translate_predicate(predicate: &str) -> Option<String> {
    if !predicate.is_empty() && predicate.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!(":nth-of-type({})", predicate));
    }

    if let Some(attribute) = predicate.strip_prefix('@') {
        return match attribute.split_once('=') {
            Some((name, value)) => {
                let name = name.trim();
                let value = unquote(value.trim())?;
                is_identifier(name).then(|| format!("[{}=\"{}\"]", name, escape(value)))
            }
            None => is_identifier(attribute).then(|| format!("[{}]", attribute)),
        };
    }

    if let Some(arguments) = predicate
        .strip_prefix("contains(")
        .and_then(|p| p.strip_suffix(')'))
    {
        let (target, value) = arguments.split_once(',')?;
        let name = target.trim().strip_prefix('@')?;
        let value = unquote(value.trim())?;
        return is_identifier(name).then(|| format!("[{}*=\"{}\"]", name, escape(value)));
    }

    None
}

fn unquote(value: &str) -> Option<&str> {
    let first = value.chars().next()?;
    if (first == '\'' || first == '"') && value.len() >= 2 && value.ends_with(first) {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
