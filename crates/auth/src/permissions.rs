use serde::{Deserialize, Serialize};

use crate::Role;

/// Dashboard area a view may require.
///
/// Permissions are named `<area>.<access>` on the wire (e.g. `fees.manage`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "schools.manage")]
    SchoolsManage,
    #[serde(rename = "classes.manage")]
    ClassesManage,
    #[serde(rename = "sections.manage")]
    SectionsManage,
    #[serde(rename = "sections.view")]
    SectionsView,
    #[serde(rename = "subjects.manage")]
    SubjectsManage,
    #[serde(rename = "subjects.view")]
    SubjectsView,
    #[serde(rename = "students.manage")]
    StudentsManage,
    #[serde(rename = "teachers.manage")]
    TeachersManage,
    #[serde(rename = "fees.manage")]
    FeesManage,
    #[serde(rename = "fees.view")]
    FeesView,
    #[serde(rename = "finance.manage")]
    FinanceManage,
    #[serde(rename = "hostel.manage")]
    HostelManage,
    #[serde(rename = "library.manage")]
    LibraryManage,
    #[serde(rename = "attendance.record")]
    AttendanceRecord,
    #[serde(rename = "attendance.view")]
    AttendanceView,
    #[serde(rename = "homework.assign")]
    HomeworkAssign,
    #[serde(rename = "homework.view")]
    HomeworkView,
    #[serde(rename = "grades.record")]
    GradesRecord,
    #[serde(rename = "grades.view")]
    GradesView,
    #[serde(rename = "notices.publish")]
    NoticesPublish,
    #[serde(rename = "notices.view")]
    NoticesView,
    #[serde(rename = "store.manage")]
    StoreManage,
    #[serde(rename = "store.shop")]
    StoreShop,
    #[serde(rename = "polls.manage")]
    PollsManage,
    #[serde(rename = "polls.vote")]
    PollsVote,
    #[serde(rename = "profile.edit")]
    ProfileEdit,
}

const SUPER_ADMIN: &[Permission] = &[
    Permission::SchoolsManage,
    Permission::NoticesPublish,
    Permission::NoticesView,
    Permission::ProfileEdit,
];

const ADMIN: &[Permission] = &[
    Permission::ClassesManage,
    Permission::SectionsManage,
    Permission::SectionsView,
    Permission::SubjectsManage,
    Permission::SubjectsView,
    Permission::StudentsManage,
    Permission::TeachersManage,
    Permission::FeesManage,
    Permission::FeesView,
    Permission::FinanceManage,
    Permission::HostelManage,
    Permission::LibraryManage,
    Permission::AttendanceView,
    Permission::GradesView,
    Permission::NoticesPublish,
    Permission::NoticesView,
    Permission::StoreManage,
    Permission::PollsManage,
    Permission::ProfileEdit,
];

const TEACHER: &[Permission] = &[
    Permission::SectionsView,
    Permission::SubjectsView,
    Permission::AttendanceRecord,
    Permission::AttendanceView,
    Permission::HomeworkAssign,
    Permission::HomeworkView,
    Permission::GradesRecord,
    Permission::GradesView,
    Permission::NoticesPublish,
    Permission::NoticesView,
    Permission::PollsVote,
    Permission::ProfileEdit,
];

const STUDENT: &[Permission] = &[
    Permission::SubjectsView,
    Permission::AttendanceView,
    Permission::FeesView,
    Permission::HomeworkView,
    Permission::GradesView,
    Permission::NoticesView,
    Permission::StoreShop,
    Permission::PollsVote,
    Permission::ProfileEdit,
];

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::SchoolsManage => "schools.manage",
            Permission::ClassesManage => "classes.manage",
            Permission::SectionsManage => "sections.manage",
            Permission::SectionsView => "sections.view",
            Permission::SubjectsManage => "subjects.manage",
            Permission::SubjectsView => "subjects.view",
            Permission::StudentsManage => "students.manage",
            Permission::TeachersManage => "teachers.manage",
            Permission::FeesManage => "fees.manage",
            Permission::FeesView => "fees.view",
            Permission::FinanceManage => "finance.manage",
            Permission::HostelManage => "hostel.manage",
            Permission::LibraryManage => "library.manage",
            Permission::AttendanceRecord => "attendance.record",
            Permission::AttendanceView => "attendance.view",
            Permission::HomeworkAssign => "homework.assign",
            Permission::HomeworkView => "homework.view",
            Permission::GradesRecord => "grades.record",
            Permission::GradesView => "grades.view",
            Permission::NoticesPublish => "notices.publish",
            Permission::NoticesView => "notices.view",
            Permission::StoreManage => "store.manage",
            Permission::StoreShop => "store.shop",
            Permission::PollsManage => "polls.manage",
            Permission::PollsVote => "polls.vote",
            Permission::ProfileEdit => "profile.edit",
        }
    }

    /// Permissions granted to `role`.
    pub fn granted_to(role: Role) -> &'static [Permission] {
        match role {
            Role::SuperAdmin => SUPER_ADMIN,
            Role::Admin => ADMIN,
            Role::Teacher => TEACHER,
            Role::Student => STUDENT,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_may_edit_its_profile() {
        for role in Role::ALL {
            assert!(Permission::granted_to(role).contains(&Permission::ProfileEdit));
        }
    }

    #[test]
    fn management_areas_are_not_granted_to_students() {
        let student = Permission::granted_to(Role::Student);
        assert!(!student.contains(&Permission::FeesManage));
        assert!(!student.contains(&Permission::StudentsManage));
        assert!(student.contains(&Permission::FeesView));
    }

    #[test]
    fn wire_names_match_serde() {
        for permission in [
            Permission::SectionsManage,
            Permission::SubjectsView,
            Permission::FeesManage,
            Permission::ProfileEdit,
        ] {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
            assert_eq!(serde_json::from_str::<Permission>(&json).unwrap(), permission);
        }
        assert!(serde_json::from_str::<Permission>("\"fees_manage\"").is_err());
    }

    #[test]
    fn sections_and_subjects_are_managed_by_school_admins() {
        let admin = Permission::granted_to(Role::Admin);
        assert!(admin.contains(&Permission::SectionsManage));
        assert!(admin.contains(&Permission::SubjectsManage));

        let teacher = Permission::granted_to(Role::Teacher);
        assert!(teacher.contains(&Permission::SectionsView));
        assert!(!teacher.contains(&Permission::SubjectsManage));

        let student = Permission::granted_to(Role::Student);
        assert!(student.contains(&Permission::SubjectsView));
        assert!(!student.contains(&Permission::SectionsManage));
    }

    #[test]
    fn only_super_admin_manages_schools() {
        for role in Role::ALL {
            let manages = Permission::granted_to(role).contains(&Permission::SchoolsManage);
            assert_eq!(manages, role == Role::SuperAdmin);
        }
    }
}
