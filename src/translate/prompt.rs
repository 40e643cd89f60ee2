//! Translation prompt construction

use crate::filter::NO_FILTER;
use crate::model::Prompt;
use crate::schema::{SchemaRegistry, ValueType};

const TASK: &str = "\
Your goal is to structure the user's query to match the request schema provided below.

Answer with a single JSON object and nothing else:

```json
{
    \"query\": string \\ text string to compare to document contents
    \"filter\": string \\ logical condition statement for filtering documents
    \"limit\": int \\ the number of documents to retrieve
}
```

The query string should contain only text that is expected to match the contents \
of documents. Any conditions in the filter should not be mentioned in the query as well.";

const GRAMMAR: &str = "\
A logical condition statement is composed of one or more comparison and logical \
operation statements.

A comparison statement takes the form: `comp(attr, val)`:
- `comp` (eq | ne | gt | gte | lt | lte | contain | in | nin): comparator
- `attr` (string): name of attribute to apply the comparison to
- `val` (string, number or list): the comparison value

A logical operation statement takes the form `op(statement1, statement2, ...)`:
- `op` (and | or | not): logical operator
- `statement1`, `statement2`, ... (comparison statements or logical operation \
statements): one or more statements to apply the operation to";

const RULES: &str = "\
Make sure that you only use the comparators and logical operators listed above and no others.
Make sure that filters only refer to attributes that exist in the data source.
Make sure that filters only use the attribute names with their function names if \
there are functions applied on them.
Make sure that filters take into account the descriptions of attributes and only \
make comparisons that are feasible given the type of data being stored.
Make sure that filters are only used as needed. If there are no filters that should \
be applied return \"NO_FILTER\" for the filter value.";

const LIMIT_RULE: &str = "\
Make sure the `limit` is always an int value. It is an optional parameter so leave \
it blank if it does not make sense.";

const NO_LIMIT_RULE: &str = "Always leave `limit` out of the answer.";

/// Builds the instruction block sent to the language model.
pub struct PromptBuilder<'a> {
    schema: &'a SchemaRegistry,
    content_description: &'a str,
    enable_limit: bool,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(schema: &'a SchemaRegistry, content_description: &'a str) -> Self {
        Self {
            schema,
            content_description,
            enable_limit: true,
        }
    }

    pub fn enable_limit(mut self, enable: bool) -> Self {
        self.enable_limit = enable;
        self
    }

    pub fn build(&self, query: &str, strict: bool) -> Prompt {
        let mut sections = vec![
            TASK.to_string(),
            GRAMMAR.to_string(),
            self.operator_table(),
            RULES.to_string(),
            if self.enable_limit { LIMIT_RULE } else { NO_LIMIT_RULE }.to_string(),
            self.examples(),
            self.data_source(),
        ];
        if strict {
            sections.push(self.strict_block());
        }

        Prompt {
            instructions: sections.join("\n\n"),
            query: query.to_string(),
            strict,
        }
    }

    fn operator_table(&self) -> String {
        let mut lines = vec!["Comparators allowed for each attribute type:".to_string()];
        for value_type in [
            ValueType::String,
            ValueType::StringList,
            ValueType::Integer,
            ValueType::Float,
        ] {
            lines.push(format!("- {}: {}", value_type, operator_names(value_type)));
        }
        lines.join("\n")
    }

    fn examples(&self) -> String {
        let limit = |n: &str| if self.enable_limit { n.to_string() } else { "null".to_string() };
        format!(
            "<< Example 1. >>\n\
             User Query:\nWhat are songs by Taylor Swift or Katy Perry about teenage romance \
             under 3 minutes long in the dance pop genre\n\n\
             Structured Request:\n\
             {{\"query\": \"teenager love\", \"filter\": \"and(or(eq(\\\"artist\\\", \\\"Taylor Swift\\\"), \
             eq(\\\"artist\\\", \\\"Katy Perry\\\")), lt(\\\"length\\\", 180), \
             contain(\\\"genre\\\", \\\"pop\\\"))\", \"limit\": null}}\n\n\
             << Example 2. >>\n\
             User Query:\nWhat are two songs that were not published on Spotify\n\n\
             Structured Request:\n\
             {{\"query\": \"\", \"filter\": \"ne(\\\"platform\\\", \\\"Spotify\\\")\", \"limit\": {}}}\n\n\
             << Example 3. >>\n\
             User Query:\nWhat are some upbeat songs to run to\n\n\
             Structured Request:\n\
             {{\"query\": \"upbeat songs to run to\", \"filter\": \"{}\", \"limit\": null}}",
            limit("2"),
            NO_FILTER
        )
    }

    fn data_source(&self) -> String {
        format!(
            "<< Data Source >>\n```json\n{{\n    \"content\": \"{}\",\n    \"attributes\": {}\n}}\n```",
            self.content_description.replace('"', "\\\""),
            indent(&self.schema.describe(), "    ")
        )
    }

    fn strict_block(&self) -> String {
        let mut lines = vec![
            "<< Strict Mode >>".to_string(),
            "The previous answer could not be used. Only these attributes and comparators are valid:"
                .to_string(),
        ];
        for attr in self.schema.attributes() {
            lines.push(format!(
                "- \"{}\" ({}): {}",
                attr.name,
                attr.value_type,
                operator_names(attr.value_type)
            ));
        }
        lines.push(format!(
            "If the query cannot be expressed with these, answer with \"{}\".",
            NO_FILTER
        ));
        if self.enable_limit {
            lines.push("`limit` must be a positive integer or null.".to_string());
        }
        lines.join("\n")
    }
}

fn operator_names(value_type: ValueType) -> String {
    SchemaRegistry::allowed_operators(value_type)
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { line.to_string() } else { format!("{}{}", prefix, line) })
        .collect::<Vec<_>>()
        .join("\n")
}
