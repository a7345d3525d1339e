//! Session requests: the unit of work the planner places.
//!
//! A course expands into one request per missing occurrence of each of its
//! series, where a series is a `(course, class group, subgroup)` tuple.
//! Requests are tagged variants per session type; each variant carries
//! exactly the fields its placement needs, so the placement engine
//! dispatches on the tag instead of probing optional fields.

use crate::domain::{
    ClassGroupId, Course, CourseClassLink, CourseId, PlanningSnapshot, SessionKind, TeacherId,
};
use crate::engine::constraints::Rejection;
use std::fmt;

/// Identity of a session series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub subgroup: Option<String>,
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subgroup {
            Some(label) => write!(f, "{}/{}/{label}", self.course, self.class_group),
            None => write!(f, "{}/{}", self.course, self.class_group),
        }
    }
}

/// Per-type payload of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDetail {
    /// Lecture attended jointly by every linked class group.
    Cm { attending: Vec<ClassGroupId> },
    /// Project session requiring two simultaneously free teachers.
    Sae {
        teacher_a: TeacherId,
        teacher_b: TeacherId,
    },
    /// Evaluation, single teacher.
    Eval,
    /// Tutorial, single teacher.
    Td,
    /// Lab; carries the subgroup label when the class is split.
    Tp { subgroup: Option<String> },
}

impl RequestDetail {
    pub fn kind(&self) -> SessionKind {
        match self {
            RequestDetail::Cm { .. } => SessionKind::Cm,
            RequestDetail::Sae { .. } => SessionKind::Sae,
            RequestDetail::Eval => SessionKind::Eval,
            RequestDetail::Td => SessionKind::Td,
            RequestDetail::Tp { .. } => SessionKind::Tp,
        }
    }
}

/// One session occurrence waiting to be placed.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub series: SeriesKey,
    pub detail: RequestDetail,
    pub duration_hours: u32,
    pub preferred_teacher: Option<TeacherId>,
    /// Placement attempts across all weeks.
    pub attempts: u32,
    /// Weeks this request has been carried past its first eligible week.
    pub carried_weeks: u32,
    /// Most specific rejection seen on the latest failed attempt.
    pub last_rejection: Option<Rejection>,
}

impl SessionRequest {
    pub fn kind(&self) -> SessionKind {
        self.detail.kind()
    }

    /// Class groups attending the session this request would place.
    pub fn attending(&self) -> Vec<ClassGroupId> {
        match &self.detail {
            RequestDetail::Cm { attending } => attending.clone(),
            _ => vec![self.series.class_group],
        }
    }

    pub fn subgroup(&self) -> Option<&str> {
        self.series.subgroup.as_deref()
    }
}

fn occurrences(
    snapshot: &PlanningSnapshot,
    course: &Course,
    class_group: ClassGroupId,
    subgroup: Option<&str>,
) -> u32 {
    course
        .sessions_required
        .saturating_sub(snapshot.existing_count(course.id, class_group, subgroup))
}

fn push_series(
    out: &mut Vec<SessionRequest>,
    snapshot: &PlanningSnapshot,
    course: &Course,
    series: SeriesKey,
    detail: RequestDetail,
    preferred_teacher: Option<TeacherId>,
) {
    let missing = occurrences(
        snapshot,
        course,
        series.class_group,
        series.subgroup.as_deref(),
    );
    for _ in 0..missing {
        out.push(SessionRequest {
            series: series.clone(),
            detail: detail.clone(),
            duration_hours: course.session_hours,
            preferred_teacher,
            attempts: 0,
            carried_weeks: 0,
            last_rejection: None,
        });
    }
}

fn single_teacher_of(link: &CourseClassLink) -> Option<TeacherId> {
    link.teacher_a.or(link.teacher_b)
}

/// Expands a course into its outstanding session requests, in link
/// declaration order (subgroup A before B for split labs).
///
/// Only missing occurrences are produced: sessions persisted by earlier
/// runs count toward `sessions_required`, which is what makes a re-run
/// with unchanged state generate nothing.
pub fn build_requests(snapshot: &PlanningSnapshot, course: &Course) -> Vec<SessionRequest> {
    let links: Vec<&CourseClassLink> = snapshot.links_for(course.id).collect();
    let mut out = Vec::new();

    match course.kind {
        SessionKind::Cm => {
            // One joint series for the whole course; the first linked group owns it.
            let Some(first) = links.first() else {
                return out;
            };
            let attending: Vec<ClassGroupId> = links.iter().map(|l| l.class_group).collect();
            push_series(
                &mut out,
                snapshot,
                course,
                SeriesKey {
                    course: course.id,
                    class_group: first.class_group,
                    subgroup: None,
                },
                RequestDetail::Cm { attending },
                single_teacher_of(first),
            );
        }
        SessionKind::Sae => {
            for link in &links {
                let (Some(teacher_a), Some(teacher_b)) = (link.teacher_a, link.teacher_b) else {
                    continue; // rejected earlier by snapshot validation
                };
                push_series(
                    &mut out,
                    snapshot,
                    course,
                    SeriesKey {
                        course: course.id,
                        class_group: link.class_group,
                        subgroup: None,
                    },
                    RequestDetail::Sae {
                        teacher_a,
                        teacher_b,
                    },
                    Some(teacher_a),
                );
            }
        }
        SessionKind::Eval | SessionKind::Td => {
            let detail = if course.kind == SessionKind::Eval {
                RequestDetail::Eval
            } else {
                RequestDetail::Td
            };
            for link in &links {
                push_series(
                    &mut out,
                    snapshot,
                    course,
                    SeriesKey {
                        course: course.id,
                        class_group: link.class_group,
                        subgroup: None,
                    },
                    detail.clone(),
                    single_teacher_of(link),
                );
            }
        }
        SessionKind::Tp => {
            for link in &links {
                if link.is_split() {
                    let label_a = link.subgroup_a.clone().unwrap_or_else(|| "A".to_owned());
                    let label_b = link.subgroup_b.clone().unwrap_or_else(|| "B".to_owned());
                    for (label, teacher) in
                        [(label_a, link.teacher_a), (label_b, link.teacher_b)]
                    {
                        push_series(
                            &mut out,
                            snapshot,
                            course,
                            SeriesKey {
                                course: course.id,
                                class_group: link.class_group,
                                subgroup: Some(label.clone()),
                            },
                            RequestDetail::Tp {
                                subgroup: Some(label),
                            },
                            teacher.or_else(|| single_teacher_of(link)),
                        );
                    }
                } else {
                    push_series(
                        &mut out,
                        snapshot,
                        course,
                        SeriesKey {
                            course: course.id,
                            class_group: link.class_group,
                            subgroup: None,
                        },
                        RequestDetail::Tp { subgroup: None },
                        single_teacher_of(link),
                    );
                }
            }
        }
    }

    out
}
