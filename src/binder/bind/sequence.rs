//! Action sequencing and required standard directories.

use crate::binder::{
    data::{
        Section, Symbol, SymbolKind,
        definitions::{is_standard_directory, standard_action_sequence},
    },
    messaging::{Message, Messaging},
};
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap},
};

/// How an action is placed in its table.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Placement {
    Absolute(i64),
    After(String),
    Before(String),
    Unplaced,
}

#[derive(Debug)]
struct ActionRow {
    index: usize,
    name: String,
    placement: Placement,
}

fn action_name(symbol: &Symbol) -> String {
    symbol
        .text("Action")
        .map(Cow::into_owned)
        .unwrap_or_else(|| {
            let id = symbol.id();
            id.rsplit_once('/').map(|(_, a)| a).unwrap_or(id).to_string()
        })
}

fn placement(symbol: &Symbol, table: &str, name: &str) -> Placement {
    if let Some(sequence) = symbol.int("Sequence") {
        return Placement::Absolute(sequence);
    }
    if let Some(parent) = symbol.text("After") {
        return Placement::After(parent.into_owned());
    }
    if let Some(parent) = symbol.text("Before") {
        return Placement::Before(parent.into_owned());
    }
    match standard_action_sequence(table, name) {
        Some(sequence) => Placement::Absolute(sequence),
        None => Placement::Unplaced,
    }
}

/// Assigns a sequence number to every action.
///
/// Actions with an explicit sequence keep it and standard actions without
/// one get their default. Relative actions are placed in authored order:
/// after their parent at the lowest free numbers and before it at the
/// highest free numbers, keeping authored order either way. An action with no
/// placement that is not a standard action is an error.
pub fn sequence_actions(section: &mut Section, messaging: &Messaging) {
    let mut tables: BTreeMap<String, Vec<ActionRow>> = BTreeMap::new();
    for index in section.indices_of(&SymbolKind::Action) {
        let symbol = &section.symbols[index];
        let Some(table) = symbol.text("SequenceTable").map(Cow::into_owned) else {
            continue;
        };
        let name = action_name(symbol);
        let placement = placement(symbol, &table, &name);
        tables.entry(table).or_default().push(ActionRow {
            index,
            name,
            placement,
        });
    }

    for (table, actions) in tables {
        sequence_table(section, &table, actions, messaging);
    }
}

fn sequence_table(
    section: &mut Section,
    table: &str,
    mut actions: Vec<ActionRow>,
    messaging: &Messaging,
) {
    // Standard parents that were never authored are scheduled at their default.
    let mut added: Vec<(String, i64)> = Vec::new();
    for action in &actions {
        let (Placement::After(parent) | Placement::Before(parent)) = &action.placement else {
            continue;
        };
        if actions.iter().any(|a| &a.name == parent) || added.iter().any(|(n, _)| n == parent) {
            continue;
        }
        if let Some(sequence) = standard_action_sequence(table, parent) {
            added.push((parent.clone(), sequence));
        }
    }
    for (name, sequence) in added {
        let index = section.add(
            Symbol::new(SymbolKind::Action, format!("{table}/{name}"))
                .with("SequenceTable", table)
                .with("Action", name.as_str())
                .with("Sequence", sequence),
        );
        actions.push(ActionRow {
            index,
            name,
            placement: Placement::Absolute(sequence),
        });
    }

    let by_name: HashMap<&str, usize> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| (a.name.as_str(), i))
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..actions.len()).map(|i| graph.add_node(i)).collect();
    let mut blocked = BTreeSet::new();

    for (i, action) in actions.iter().enumerate() {
        let (Placement::After(parent) | Placement::Before(parent)) = &action.placement else {
            continue;
        };
        match by_name.get(parent.as_str()) {
            Some(&p) => {
                graph.add_edge(nodes[p], nodes[i], ());
            }
            None => {
                blocked.insert(i);
                messaging.error(
                    section.symbols[action.index].source.as_ref(),
                    Message::ActionParentMissing {
                        table: table.to_string(),
                        action: action.name.clone(),
                        parent: parent.clone(),
                    },
                );
            }
        }
    }

    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1
            || component
                .first()
                .is_some_and(|n| graph.contains_edge(*n, *n));
        if !cyclic {
            continue;
        }
        let mut members: Vec<usize> = component.iter().map(|n| graph[*n]).collect();
        members.sort_unstable();
        for i in members {
            blocked.insert(i);
            messaging.error(
                section.symbols[actions[i].index].source.as_ref(),
                Message::ActionCircularDependency {
                    table: table.to_string(),
                    action: actions[i].name.clone(),
                },
            );
        }
    }

    let mut sequences: Vec<Option<i64>> = actions
        .iter()
        .map(|a| match a.placement {
            Placement::Absolute(sequence) => Some(sequence),
            _ => None,
        })
        .collect();
    let mut used: BTreeSet<i64> = sequences.iter().flatten().copied().collect();

    loop {
        let mut progressed = false;
        for (i, action) in actions.iter().enumerate() {
            if sequences[i].is_some() || blocked.contains(&i) {
                continue;
            }
            let (parent, after) = match &action.placement {
                Placement::After(parent) => (parent, true),
                Placement::Before(parent) => (parent, false),
                _ => continue,
            };
            let Some(anchor) = by_name.get(parent.as_str()).and_then(|&p| sequences[p]) else {
                continue;
            };

            // Actions before the same parent share the numbers below it.
            let targets: Vec<usize> = if after {
                vec![i]
            } else {
                actions
                    .iter()
                    .enumerate()
                    .filter(|(j, a)| {
                        sequences[*j].is_none()
                            && !blocked.contains(j)
                            && matches!(&a.placement, Placement::Before(p) if p == parent)
                    })
                    .map(|(j, _)| j)
                    .collect()
            };
            let free: Vec<i64> = if after {
                (anchor + 1..).find(|s| !used.contains(s)).into_iter().collect()
            } else {
                let mut below: Vec<i64> = (1..anchor)
                    .rev()
                    .filter(|s| !used.contains(s))
                    .take(targets.len())
                    .collect();
                below.reverse();
                below
            };

            let (unplaced, placed) = targets.split_at(targets.len() - free.len());
            for &j in unplaced {
                blocked.insert(j);
                messaging.error(
                    section.symbols[actions[j].index].source.as_ref(),
                    Message::ActionCannotBeSequenced {
                        table: table.to_string(),
                        action: actions[j].name.clone(),
                        parent: parent.clone(),
                    },
                );
            }
            for (&j, sequence) in placed.iter().zip(free) {
                sequences[j] = Some(sequence);
                used.insert(sequence);
            }
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    for (action, sequence) in actions.iter().zip(&sequences) {
        if action.placement == Placement::Unplaced {
            messaging.error(
                section.symbols[action.index].source.as_ref(),
                Message::ActionNotScheduled {
                    table: table.to_string(),
                    action: action.name.clone(),
                },
            );
        }
        let symbol = &mut section.symbols[action.index];
        if let Some(sequence) = *sequence
            && symbol.int("Sequence") != Some(sequence)
        {
            symbol.set("Sequence", sequence);
        }
    }
}

/// Adds `TARGETDIR` and every referenced but undefined standard directory.
pub fn add_required_standard_directories(section: &mut Section) {
    let defined: BTreeSet<String> = section
        .symbols_of(&SymbolKind::Directory)
        .map(|d| d.id().to_string())
        .collect();

    let mut referenced = BTreeSet::new();
    for symbol in &section.symbols {
        let field = match symbol.kind {
            SymbolKind::Directory => "Directory_Parent",
            SymbolKind::Component => "Directory_",
            _ => continue,
        };
        if let Some(directory) = symbol.text(field)
            && is_standard_directory(&directory)
        {
            referenced.insert(directory.into_owned());
        }
    }
    referenced.remove("TARGETDIR");

    if !defined.contains("TARGETDIR") {
        section.add(Symbol::new(SymbolKind::Directory, "TARGETDIR").with("DefaultDir", "SourceDir"));
    }
    for directory in referenced.difference(&defined) {
        section.add(
            Symbol::new(SymbolKind::Directory, directory.as_str())
                .with("Directory_Parent", "TARGETDIR")
                .with("DefaultDir", directory.as_str()),
        );
    }
}
