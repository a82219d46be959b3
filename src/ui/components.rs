/// Reusable UI components for the options page

use yew::prelude::*;
use patternfly_yew::prelude::*;
use crate::tenants::{TenantEntry, TenantSource};

#[derive(Properties, PartialEq)]
pub struct SourceBadgeProps {
    pub source: TenantSource,
    #[prop_or_default]
    pub bundled_name: Option<String>,
}

#[function_component(SourceBadge)]
pub fn source_badge(props: &SourceBadgeProps) -> Html {
    let (class, text) = match props.source {
        TenantSource::Bundled => ("pf-v5-c-label", "default".to_string()),
        TenantSource::User => ("pf-v5-c-label pf-m-blue", "custom".to_string()),
        TenantSource::Override => (
            "pf-v5-c-label pf-m-orange",
            match &props.bundled_name {
                Some(name) => format!("overrides \"{}\"", name),
                None => "overrides default".to_string(),
            },
        ),
    };

    html! {
        <span class={class}>
            <span class="pf-v5-c-label__content">{text}</span>
        </span>
    }
}

#[derive(Properties, PartialEq)]
pub struct MappingRowProps {
    pub entry: TenantEntry,
    pub on_edit: Callback<(String, String)>,
    /// Removes the user entry; for overrides this restores the default name
    pub on_remove: Callback<String>,
}

#[function_component(MappingRow)]
pub fn mapping_row(props: &MappingRowProps) -> Html {
    let entry = &props.entry;

    let on_edit = props.on_edit.reform({
        let uuid = entry.uuid.clone();
        let name = entry.name.clone();
        move |_| (uuid.clone(), name.clone())
    });

    let on_remove = props.on_remove.reform({
        let uuid = entry.uuid.clone();
        move |_| uuid.clone()
    });

    html! {
        <tr class="mapping-row">
            <td class="mapping-name">{&entry.name}</td>
            <td class="mapping-uuid"><code>{&entry.uuid}</code></td>
            <td>
                <SourceBadge source={entry.source} bundled_name={entry.bundled_name.clone()} />
            </td>
            <td class="mapping-actions">
                <Button onclick={on_edit} variant={ButtonVariant::Secondary}>
                    {"✏️"}
                </Button>
                {match entry.source {
                    TenantSource::User => html! {
                        <Button onclick={on_remove} variant={ButtonVariant::Danger}>
                            {"🗑️"}
                        </Button>
                    },
                    TenantSource::Override => html! {
                        <Button onclick={on_remove} variant={ButtonVariant::Secondary}>
                            {"↺ Reset to default"}
                        </Button>
                    },
                    TenantSource::Bundled => html! {},
                }}
            </td>
        </tr>
    }
}
